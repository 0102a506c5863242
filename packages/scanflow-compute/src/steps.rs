//! Computation steps run by a task container, in order
//!
//! ```text
//! load-report -> enrich-lines -> persist-file-sources
//! ```

use crate::container::resources::{ComponentIndex, ReportHandle, ResourceScope};
use crate::container::ServerContext;
use crate::enrichment::EnrichedComponent;
use crate::error::{ComputeError, Result};
use crate::task::Task;
use async_trait::async_trait;
use chrono::Utc;
use scanflow_report::Metadata;
use scanflow_storage::{FileSourceRecord, StorageError};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Counters filled by the steps
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    pub components_processed: usize,
    pub files_written: usize,
    pub files_unchanged: usize,
}

/// State handed from one step to the next within a single task
pub struct StepContext {
    pub task: Task,
    parent: Arc<ServerContext>,
    scope: Arc<ResourceScope>,
    cancel: CancellationToken,
    pub report: Option<Arc<ReportHandle>>,
    pub metadata: Option<Metadata>,
    pub components: Option<Arc<ComponentIndex>>,
    pub stats: StepStats,
}

impl StepContext {
    pub fn new(
        task: Task,
        parent: Arc<ServerContext>,
        scope: Arc<ResourceScope>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            task,
            parent,
            scope,
            cancel,
            report: None,
            metadata: None,
            components: None,
            stats: StepStats::default(),
        }
    }

    /// Read-only parent scope
    pub fn parent(&self) -> &ServerContext {
        &self.parent
    }

    pub fn scope(&self) -> &ResourceScope {
        &self.scope
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ComputeError::Cancelled);
        }
        Ok(())
    }
}

/// One step of the computation
#[async_trait]
pub trait ComputationStep: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut StepContext) -> Result<()>;
}

/// Run `steps` in order, checking for cancellation before each one
pub async fn run_steps(steps: &[Arc<dyn ComputationStep>], ctx: &mut StepContext) -> Result<()> {
    for step in steps {
        ctx.check_cancelled()?;
        debug!(task_id = %ctx.task.id, step = step.name(), "Executing step");
        step.execute(ctx).await?;
    }
    Ok(())
}

/// The steps a container runs when nothing else is configured
pub fn default_steps() -> Vec<Arc<dyn ComputationStep>> {
    vec![
        Arc::new(LoadReportStep),
        Arc::new(EnrichLinesStep),
        Arc::new(PersistFileSourcesStep),
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
// Load report
// ═══════════════════════════════════════════════════════════════════════════

/// Opens the task's report and reads its metadata
pub struct LoadReportStep;

#[async_trait]
impl ComputationStep for LoadReportStep {
    fn name(&self) -> &'static str {
        "load-report"
    }

    async fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        let handle = ReportHandle::open(&ctx.task.report_path)?;
        let handle = ctx.scope().track(Arc::new(handle))?;
        let metadata = handle.read_metadata()?;

        info!(
            task_id = %ctx.task.id,
            project = metadata.project_key(),
            branch = metadata.branch().unwrap_or(""),
            "Report loaded"
        );

        ctx.metadata = Some(metadata);
        ctx.report = Some(handle);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Enrich lines
// ═══════════════════════════════════════════════════════════════════════════

/// Runs every component section through the configured line pipeline
pub struct EnrichLinesStep;

#[async_trait]
impl ComputationStep for EnrichLinesStep {
    fn name(&self) -> &'static str {
        "enrich-lines"
    }

    async fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        let report = ctx
            .report
            .clone()
            .ok_or_else(|| ComputeError::step_failed(self.name(), "report not loaded"))?;
        let index = ctx.scope().track(Arc::new(ComponentIndex::new()))?;

        for key in report.component_keys()? {
            ctx.check_cancelled()?;

            let section = match report.read_component_section(key) {
                Ok(section) => section,
                Err(ComputeError::Report(e)) if e.is_recoverable() => {
                    warn!(task_id = %ctx.task.id, component = %key, "Skipping component: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let enriched = ctx.parent().pipeline().enrich(section);
            debug!(
                task_id = %ctx.task.id,
                component = %key,
                lines = enriched.lines.len(),
                "Component enriched"
            );
            index.push(enriched)?;

            tokio::task::yield_now().await;
        }

        ctx.stats.components_processed = index.len();
        ctx.components = Some(index);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Persist file sources
// ═══════════════════════════════════════════════════════════════════════════

/// Commits one file source per enriched component, in a single transaction
pub struct PersistFileSourcesStep;

#[async_trait]
impl ComputationStep for PersistFileSourcesStep {
    fn name(&self) -> &'static str {
        "persist-file-sources"
    }

    async fn execute(&self, ctx: &mut StepContext) -> Result<()> {
        let metadata = ctx
            .metadata
            .as_ref()
            .ok_or_else(|| ComputeError::step_failed(self.name(), "report not loaded"))?;
        let index = ctx
            .components
            .as_ref()
            .ok_or_else(|| ComputeError::step_failed(self.name(), "lines not enriched"))?;

        let updated_at = Utc::now().timestamp_millis();
        let records = index.with_components(|components| {
            components
                .iter()
                .map(|c| file_source_record(metadata, c, updated_at))
                .collect::<Result<Vec<_>>>()
        })??;

        // Last point where cancellation leaves nothing behind
        ctx.check_cancelled()?;

        let stats = {
            let mut session = ctx.parent().repository().open_session()?;
            session.persist_file_sources(&records)?
        };

        info!(
            task_id = %ctx.task.id,
            written = stats.written,
            unchanged = stats.unchanged,
            "File sources persisted"
        );
        ctx.stats.files_written = stats.written;
        ctx.stats.files_unchanged = stats.unchanged;
        Ok(())
    }
}

/// Database key of a report component: `<project>:<path>`, or the report
/// key for components without a path
pub fn component_db_key(metadata: &Metadata, component: &EnrichedComponent) -> String {
    match &component.path {
        Some(path) => format!("{}:{}", metadata.project_key(), path),
        None => format!("{}:{}", metadata.project_key(), component.key),
    }
}

pub fn file_source_record(
    metadata: &Metadata,
    component: &EnrichedComponent,
    updated_at: i64,
) -> Result<FileSourceRecord> {
    let line_data = serde_json::to_string(&component.lines).map_err(StorageError::from)?;

    let mut hasher = Sha256::new();
    hasher.update(line_data.as_bytes());
    let data_hash = format!("{:x}", hasher.finalize());

    Ok(FileSourceRecord {
        project_key: metadata.project_key().to_string(),
        component_key: component_db_key(metadata, component),
        line_count: component.lines.len() as u32,
        line_data,
        data_hash,
        revision: component.latest_change.as_ref().map(|c| c.revision.clone()),
        last_change_date: component.latest_change.as_ref().map(|c| c.date),
        analysis_date: metadata.analysis_date(),
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanflow_report::{Changeset, ComponentKey, Line};

    fn component(path: Option<&str>) -> EnrichedComponent {
        let mut line = Line::new(1);
        line.scm_revision = Some("rev-9".to_string());
        EnrichedComponent {
            key: ComponentKey::Ref(5),
            path: path.map(str::to_string),
            lines: vec![line, Line::new(2)],
            latest_change: Some(Changeset::new(Some("john"), "rev-9", 900)),
        }
    }

    #[test]
    fn test_file_source_record() {
        let metadata = Metadata::new(1234567, "foo", None, false).unwrap();
        let record = file_source_record(&metadata, &component(Some("src/A.java")), 42).unwrap();

        assert_eq!(record.project_key, "foo");
        assert_eq!(record.component_key, "foo:src/A.java");
        assert_eq!(record.line_count, 2);
        assert_eq!(record.line_data, r#"[{"line":1,"scm_revision":"rev-9"},{"line":2}]"#);
        assert_eq!(record.data_hash.len(), 64);
        assert_eq!(record.revision.as_deref(), Some("rev-9"));
        assert_eq!(record.last_change_date, Some(900));
        assert_eq!(record.analysis_date, 1234567);
        assert_eq!(record.updated_at, 42);
    }

    #[test]
    fn test_same_lines_same_hash() {
        let metadata = Metadata::new(1, "foo", None, false).unwrap();
        let a = file_source_record(&metadata, &component(Some("a")), 1).unwrap();
        let b = file_source_record(&metadata, &component(Some("a")), 2).unwrap();
        assert_eq!(a.data_hash, b.data_hash);

        let mut changed = component(Some("a"));
        changed.lines[1].scm_author = Some("jane".to_string());
        let c = file_source_record(&metadata, &changed, 3).unwrap();
        assert_ne!(a.data_hash, c.data_hash);
    }

    #[test]
    fn test_component_without_path_keyed_by_report_key() {
        let metadata = Metadata::new(1, "foo", None, false).unwrap();
        assert_eq!(component_db_key(&metadata, &component(None)), "foo:ref:5");
    }
}
