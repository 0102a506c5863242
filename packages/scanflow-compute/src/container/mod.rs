//! Task containers
//!
//! A [`TaskContainer`] processes exactly one [`Task`]. It reads its
//! collaborators from an immutable [`ServerContext`] shared by all
//! containers, tracks everything it acquires in its own
//! [`ResourceScope`], and releases that scope exactly once after reaching
//! a terminal state. A panicking step fails the task; it never skips the
//! cleanup.

pub mod resources;
pub mod state;

pub use resources::{ComponentIndex, ReportHandle, ResourceScope, ScopedResource};
pub use state::{ContainerState, ContainerStateMachine};

use crate::config::ComputeConfig;
use crate::enrichment::{EnricherKind, LinePipeline};
use crate::error::{ComputeError, Result};
use crate::steps::{default_steps, run_steps, ComputationStep, StepContext, StepStats};
use crate::task::{Task, TaskOutcome, TaskStatus};
use scanflow_storage::Repository;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Collaborators shared by every container, never mutated by them
pub struct ServerContext {
    repository: Arc<dyn Repository>,
    pipeline: LinePipeline,
    steps: Vec<Arc<dyn ComputationStep>>,
}

impl ServerContext {
    pub fn new(repository: Arc<dyn Repository>, enrichers: Vec<EnricherKind>) -> Self {
        Self {
            repository,
            pipeline: LinePipeline::new(enrichers),
            steps: default_steps(),
        }
    }

    /// Open the configured database with the configured enrichers
    pub fn from_config(config: &ComputeConfig) -> Result<Self> {
        let repository = config.database.open()?;
        Ok(Self::new(Arc::new(repository), config.enrichers.clone()))
    }

    /// Replace the default step list
    pub fn with_steps(mut self, steps: Vec<Arc<dyn ComputationStep>>) -> Self {
        self.steps = steps;
        self
    }

    pub fn repository(&self) -> &dyn Repository {
        self.repository.as_ref()
    }

    pub fn pipeline(&self) -> &LinePipeline {
        &self.pipeline
    }

    pub fn steps(&self) -> &[Arc<dyn ComputationStep>] {
        &self.steps
    }
}

/// Execution scope of a single task
pub struct TaskContainer {
    task: Task,
    parent: Arc<ServerContext>,
    state: ContainerStateMachine,
    scope: Arc<ResourceScope>,
    released_resources: usize,
    cleaned: bool,
    /// Steps still running on the runtime, stopped by `cleanup`
    running: Option<(AbortHandle, CancellationToken)>,
}

impl TaskContainer {
    pub fn new(task: Task, parent: Arc<ServerContext>) -> Self {
        let scope = Arc::new(ResourceScope::new(format!("task:{}", task.id)));
        Self {
            task,
            parent,
            state: ContainerStateMachine::new(),
            scope,
            released_resources: 0,
            cleaned: false,
            running: None,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Read-only parent scope
    pub fn parent(&self) -> &ServerContext {
        &self.parent
    }

    pub fn state(&self) -> &ContainerState {
        self.state.state()
    }

    pub fn scope(&self) -> &Arc<ResourceScope> {
        &self.scope
    }

    /// Run the steps to a terminal state, then clean up
    pub async fn execute(mut self, cancel: CancellationToken) -> TaskOutcome {
        let start = Instant::now();
        let task_id = self.task.id;

        if let Err(e) = self.state.start() {
            error!(task_id = %task_id, "Cannot start container: {}", e);
            let status = TaskStatus::Failed {
                error: e.to_string(),
                error_category: e.category(),
            };
            self.cleanup();
            return self.outcome(status, StepStats::default(), start);
        }
        info!(task_id = %task_id, report = %self.task.report_path.display(), "Task started");

        let steps_cancel = cancel.child_token();
        let mut ctx = StepContext::new(
            self.task.clone(),
            self.parent.clone(),
            self.scope.clone(),
            steps_cancel.clone(),
        );
        let parent = self.parent.clone();
        let handle = tokio::spawn(async move {
            run_steps(parent.steps(), &mut ctx).await?;
            Ok::<_, ComputeError>(ctx.stats)
        });
        self.running = Some((handle.abort_handle(), steps_cancel));

        let joined = handle.await;
        self.running = None;
        let result = match joined {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(ComputeError::StepPanicked(panic_message(join_err.into_panic())))
            }
            Err(join_err) => Err(ComputeError::StepPanicked(join_err.to_string())),
        };

        let (status, stats) = match result {
            Ok(stats) => {
                if let Err(e) = self.state.complete() {
                    error!(task_id = %task_id, "{}", e);
                }
                info!(
                    task_id = %task_id,
                    components = stats.components_processed,
                    written = stats.files_written,
                    "Task completed"
                );
                (TaskStatus::Completed, stats)
            }
            Err(e) => {
                let category = e.category();
                if matches!(e, ComputeError::Cancelled) {
                    warn!(task_id = %task_id, "Task cancelled");
                } else {
                    error!(task_id = %task_id, category = %category, "Task failed: {}", e);
                }
                if let Err(transition) = self.state.fail(e.to_string(), category) {
                    error!(task_id = %task_id, "{}", transition);
                }
                (
                    TaskStatus::Failed {
                        error: e.to_string(),
                        error_category: category,
                    },
                    StepStats::default(),
                )
            }
        };

        self.cleanup();
        self.outcome(status, stats, start)
    }

    fn outcome(&self, status: TaskStatus, stats: StepStats, start: Instant) -> TaskOutcome {
        TaskOutcome {
            task_id: self.task.id,
            status,
            components_processed: stats.components_processed,
            files_written: stats.files_written,
            files_unchanged: stats.files_unchanged,
            released_resources: self.released_resources,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Release the container's resources. Runs once; later calls are no-ops.
    pub fn cleanup(&mut self) {
        if self.cleaned {
            return;
        }
        self.cleaned = true;
        if let Some((abort, steps_cancel)) = self.running.take() {
            warn!(
                task_id = %self.task.id,
                "Container dropped while steps were running, aborting them"
            );
            steps_cancel.cancel();
            abort.abort();
        }
        self.released_resources = self.scope.release_all();

        if self.state.state().is_terminal() {
            if let Err(e) = self.state.clean() {
                error!(task_id = %self.task.id, "{}", e);
            }
        }
        info!(
            task_id = %self.task.id,
            released = self.released_resources,
            state = self.state.state().state_name(),
            "Container cleaned up"
        );
    }
}

impl Drop for TaskContainer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
