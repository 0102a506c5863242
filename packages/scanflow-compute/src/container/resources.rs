//! Resources scoped to one container
//!
//! Anything a step acquires for the duration of a task (open report
//! handles, in-memory indices, nested scopes) is tracked by the
//! container's [`ResourceScope`] and released by its cleanup, whichever
//! way the task ended.

use crate::enrichment::EnrichedComponent;
use crate::error::{ComputeError, Result};
use parking_lot::Mutex;
use scanflow_report::{ComponentKey, Metadata, ReportReader, ReportError};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A resource released when its scope is cleaned up
pub trait ScopedResource: Send + Sync {
    fn name(&self) -> &str;

    /// Free the resource. Called at most once by the owning scope.
    fn release(&self);

    fn is_released(&self) -> bool;
}

/// Set of resources released together
pub struct ResourceScope {
    name: String,
    resources: Mutex<Vec<Arc<dyn ScopedResource>>>,
    released: AtomicBool,
    release_runs: AtomicUsize,
}

impl ResourceScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
            release_runs: AtomicUsize::new(0),
        }
    }

    /// Track a resource. A scope that was already released refuses new
    /// resources and frees the one handed in.
    pub fn track<R: ScopedResource + 'static>(&self, resource: Arc<R>) -> Result<Arc<R>> {
        let mut resources = self.resources.lock();
        if self.released.load(Ordering::SeqCst) {
            resource.release();
            return Err(ComputeError::ResourceReleased(resource.name().to_string()));
        }
        resources.push(resource.clone());
        Ok(resource)
    }

    /// Nested scope, released with this one
    pub fn child(&self, name: impl Into<String>) -> Result<Arc<ResourceScope>> {
        self.track(Arc::new(ResourceScope::new(name)))
    }

    /// Number of resources currently tracked
    pub fn tracked(&self) -> usize {
        self.resources.lock().len()
    }

    /// How many times a release actually ran (0 or 1)
    pub fn release_runs(&self) -> usize {
        self.release_runs.load(Ordering::SeqCst)
    }

    /// Release every tracked resource, most recent first
    ///
    /// Returns the number of resources released. Only the first call does
    /// anything.
    pub fn release_all(&self) -> usize {
        let drained: Vec<_> = {
            let mut resources = self.resources.lock();
            if self.released.swap(true, Ordering::SeqCst) {
                return 0;
            }
            resources.drain(..).collect()
        };
        self.release_runs.fetch_add(1, Ordering::SeqCst);

        let count = drained.len();
        for resource in drained.into_iter().rev() {
            debug!(scope = %self.name, resource = resource.name(), "Releasing resource");
            resource.release();
        }
        count
    }
}

impl ScopedResource for ResourceScope {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&self) {
        self.release_all();
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Report handle
// ═══════════════════════════════════════════════════════════════════════════

/// Open report file, closed on release
pub struct ReportHandle {
    name: String,
    reader: Mutex<Option<ReportReader>>,
}

impl ReportHandle {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = ReportReader::open(path)?;
        Ok(Self {
            name: format!("report:{}", path.display()),
            reader: Mutex::new(Some(reader)),
        })
    }

    fn with_reader<T>(
        &self,
        f: impl FnOnce(&mut ReportReader) -> std::result::Result<T, ReportError>,
    ) -> Result<T> {
        let mut guard = self.reader.lock();
        let reader = guard
            .as_mut()
            .ok_or_else(|| ComputeError::ResourceReleased(self.name.clone()))?;
        Ok(f(reader)?)
    }

    pub fn read_metadata(&self) -> Result<Metadata> {
        self.with_reader(|r| r.read_metadata())
    }

    /// Keys of the report's component sections, in write order
    pub fn component_keys(&self) -> Result<Vec<ComponentKey>> {
        self.with_reader(|r| Ok(r.component_keys()))
    }

    pub fn read_component_section(
        &self,
        key: ComponentKey,
    ) -> Result<scanflow_report::ComponentSection> {
        self.with_reader(|r| r.read_component_section(key))
    }
}

impl ScopedResource for ReportHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn release(&self) {
        self.reader.lock().take();
    }

    fn is_released(&self) -> bool {
        self.reader.lock().is_none()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Enriched component index
// ═══════════════════════════════════════════════════════════════════════════

/// Enriched components waiting for commit
pub struct ComponentIndex {
    components: Mutex<Vec<EnrichedComponent>>,
    released: AtomicBool,
}

impl Default for ComponentIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ComponentIndex {
    pub fn new() -> Self {
        Self {
            components: Mutex::new(Vec::new()),
            released: AtomicBool::new(false),
        }
    }

    pub fn push(&self, component: EnrichedComponent) -> Result<()> {
        if self.is_released() {
            return Err(ComputeError::ResourceReleased(self.name().to_string()));
        }
        self.components.lock().push(component);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.components.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` over the indexed components, in insertion order
    pub fn with_components<T>(&self, f: impl FnOnce(&[EnrichedComponent]) -> T) -> Result<T> {
        if self.is_released() {
            return Err(ComputeError::ResourceReleased(self.name().to_string()));
        }
        Ok(f(&self.components.lock()))
    }
}

impl ScopedResource for ComponentIndex {
    fn name(&self) -> &str {
        "component-index"
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.components.lock().clear();
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}
