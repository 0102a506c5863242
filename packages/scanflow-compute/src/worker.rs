//! Task worker
//!
//! Pulls tasks from a [`TaskQueue`], runs each one in a fresh
//! [`TaskContainer`] and reports the outcome back. At most `workers`
//! containers run at the same time.

use crate::container::{ServerContext, TaskContainer};
use crate::error::ErrorCategory;
use crate::task::{TaskOutcome, TaskQueue, TaskStatus};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// Totals for one `run` of the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub completed: usize,
    pub failed: usize,
}

impl WorkerStats {
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

pub struct TaskWorker {
    queue: Arc<dyn TaskQueue>,
    parent: Arc<ServerContext>,
    workers: usize,
}

impl TaskWorker {
    pub fn new(queue: Arc<dyn TaskQueue>, parent: Arc<ServerContext>, workers: usize) -> Self {
        Self {
            queue,
            parent,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process tasks until the queue is drained or `cancel` fires
    ///
    /// Cancellation stops polling and is forwarded to the running
    /// containers; their outcomes are still reported.
    pub async fn run(&self, cancel: CancellationToken) -> WorkerStats {
        let mut stats = WorkerStats::default();
        let mut running = FuturesUnordered::new();

        loop {
            if cancel.is_cancelled() {
                info!("Worker cancelled, waiting for {} running task(s)", running.len());
                break;
            }

            if running.len() >= self.workers {
                if let Some((task_id, joined)) = running.next().await {
                    self.report(task_id, joined, &mut stats).await;
                }
                continue;
            }

            let Some(task) = self.queue.poll().await else {
                break;
            };

            let task_id = task.id;
            let container = TaskContainer::new(task, self.parent.clone());
            let handle = tokio::spawn(container.execute(cancel.child_token()));
            running.push(async move { (task_id, handle.await) });
        }

        while let Some((task_id, joined)) = running.next().await {
            self.report(task_id, joined, &mut stats).await;
        }

        info!(
            completed = stats.completed,
            failed = stats.failed,
            "Worker finished"
        );
        stats
    }

    async fn report(
        &self,
        task_id: Uuid,
        joined: std::result::Result<TaskOutcome, JoinError>,
        stats: &mut WorkerStats,
    ) {
        let outcome = joined.unwrap_or_else(|e| {
            error!(task_id = %task_id, "Container task aborted: {}", e);
            TaskOutcome {
                task_id,
                status: TaskStatus::Failed {
                    error: format!("container task aborted: {}", e),
                    error_category: ErrorCategory::Infrastructure,
                },
                components_processed: 0,
                files_written: 0,
                files_unchanged: 0,
                released_resources: 0,
                duration_ms: 0,
            }
        });

        if outcome.status.is_completed() {
            stats.completed += 1;
        } else {
            stats.failed += 1;
        }

        if let Err(e) = self.queue.report(outcome).await {
            error!(task_id = %task_id, "Failed to report outcome: {}", e);
        }
    }
}
