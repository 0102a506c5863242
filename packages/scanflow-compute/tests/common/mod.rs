//! Shared fixtures: sample reports, a fresh repository and test steps
#![allow(dead_code)]

use async_trait::async_trait;
use scanflow_compute::container::ScopedResource;
use scanflow_compute::steps::{ComputationStep, StepContext};
use scanflow_compute::{ComputeError, EnricherKind, Result, ServerContext};
use scanflow_report::{
    write_report, Changeset, ComponentKey, ComponentSection, Duplication, Metadata, ScmInfo,
    TextRange,
};
use scanflow_storage::SqliteRepository;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const ANALYSIS_DATE: i64 = 1_234_567;

/// Report for project `foo`:
///
/// - `src/A.java` (ref 2): 3 lines, blamed, lines 1 and 3 duplicated
/// - `src/B.java` (ref 3): 2 lines, no blame
pub fn write_sample_report(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    let metadata = Metadata::new(ANALYSIS_DATE, "foo", None, false).unwrap();
    let sections = vec![
        ComponentSection::new(ComponentKey::Ref(2), 3)
            .with_path("src/A.java")
            .with_scm(ScmInfo::new(
                vec![
                    Changeset::new(Some("john"), "rev-1", 1000),
                    Changeset::new(Some("jane"), "rev-2", 3000),
                    Changeset::new(None, "rev-3", 3000),
                ],
                vec![0, 1, 2],
            ))
            .with_duplication(
                Duplication::new(TextRange::new(1, 1)).with_inner_duplicate(TextRange::new(3, 3)),
            ),
        ComponentSection::new(ComponentKey::Ref(3), 2).with_path("src/B.java"),
    ];
    write_report(&path, &metadata, &sections).unwrap();
    path
}

/// Break the length prefix of a string stored in the report, so decoding
/// the frame holding it fails
pub fn corrupt_string_in_report(path: &Path, needle: &str) {
    let mut bytes = std::fs::read(path).unwrap();
    let pos = bytes
        .windows(needle.len())
        .position(|w| w == needle.as_bytes())
        .unwrap();
    bytes[pos - 4..pos].copy_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(path, bytes).unwrap();
}

pub fn repository() -> Arc<SqliteRepository> {
    Arc::new(SqliteRepository::in_memory().unwrap())
}

pub fn server_context(repository: Arc<SqliteRepository>) -> Arc<ServerContext> {
    Arc::new(ServerContext::new(
        repository,
        EnricherKind::default_order(),
    ))
}

// ═══════════════════════════════════════════════════════════════════════════
// Test resources and steps
// ═══════════════════════════════════════════════════════════════════════════

/// Resource counting its releases
#[derive(Default)]
pub struct CountedResource {
    releases: AtomicUsize,
}

impl CountedResource {
    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl ScopedResource for CountedResource {
    fn name(&self) -> &str {
        "counted"
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn is_released(&self) -> bool {
        self.releases() > 0
    }
}

/// Tracks a counted resource in the container scope
pub struct TrackCounterStep(pub Arc<CountedResource>);

#[async_trait]
impl ComputationStep for TrackCounterStep {
    fn name(&self) -> &'static str {
        "track-counter"
    }

    async fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        ctx.scope().track(self.0.clone())?;
        Ok(())
    }
}

pub struct FailingStep;

#[async_trait]
impl ComputationStep for FailingStep {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn execute(&self, _ctx: &mut StepContext) -> Result<()> {
        Err(ComputeError::step_failed(self.name(), "simulated failure"))
    }
}

pub struct PanickingStep;

#[async_trait]
impl ComputationStep for PanickingStep {
    fn name(&self) -> &'static str {
        "panicking"
    }

    async fn execute(&self, _ctx: &mut StepContext) -> Result<()> {
        panic!("boom");
    }
}

/// Cancels the given token, as an operator would mid-task
pub struct CancellingStep(pub CancellationToken);

#[async_trait]
impl ComputationStep for CancellingStep {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    async fn execute(&self, _ctx: &mut StepContext) -> Result<()> {
        self.0.cancel();
        Ok(())
    }
}

/// Records the highest number of concurrently running executions
#[derive(Default)]
pub struct ConcurrencyGaugeStep {
    running: AtomicUsize,
    max_seen: AtomicUsize,
}

impl ConcurrencyGaugeStep {
    pub fn max_seen(&self) -> usize {
        self.max_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComputationStep for ConcurrencyGaugeStep {
    fn name(&self) -> &'static str {
        "concurrency-gauge"
    }

    async fn execute(&self, _ctx: &mut StepContext) -> Result<()> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sleeps, then counts how many executions ran to the end
pub struct SlowStep {
    pub delay: Duration,
    finished: AtomicUsize,
}

impl SlowStep {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            finished: AtomicUsize::new(0),
        }
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ComputationStep for SlowStep {
    fn name(&self) -> &'static str {
        "slow"
    }

    async fn execute(&self, _ctx: &mut StepContext) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Resource whose release panics, taking the container task down with it
pub struct PanicOnRelease;

impl ScopedResource for PanicOnRelease {
    fn name(&self) -> &str {
        "panic-on-release"
    }

    fn release(&self) {
        panic!("release failed");
    }

    fn is_released(&self) -> bool {
        false
    }
}

pub struct TrackPanicOnReleaseStep;

#[async_trait]
impl ComputationStep for TrackPanicOnReleaseStep {
    fn name(&self) -> &'static str {
        "track-panic-on-release"
    }

    async fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        ctx.scope().track(Arc::new(PanicOnRelease))?;
        Ok(())
    }
}
