//! Tasks and the queue that owns them
//!
//! The queue hands out one [`Task`] at a time and receives the terminal
//! [`TaskOutcome`] back. Retry and dead-letter decisions belong to the
//! queue; nothing in this crate re-enqueues a task.

use crate::error::{ErrorCategory, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use uuid::Uuid;

/// One report to process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: Uuid,
    pub report_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(report_path: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            report_path: report_path.into(),
            created_at: Utc::now(),
        }
    }
}

/// Terminal status of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Failed {
        error: String,
        error_category: ErrorCategory,
    },
}

impl TaskStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, TaskStatus::Completed)
    }
}

/// What the container reports back for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub task_id: Uuid,
    pub status: TaskStatus,
    pub components_processed: usize,
    pub files_written: usize,
    pub files_unchanged: usize,
    /// Resources released by the container's cleanup
    pub released_resources: usize,
    pub duration_ms: u64,
}

/// Task queue port
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Next task, `None` once the queue is drained
    async fn poll(&self) -> Option<Task>;

    /// Receive the terminal outcome of a task handed out by `poll`
    async fn report(&self, outcome: TaskOutcome) -> Result<()>;
}

/// FIFO queue kept in memory
#[derive(Default)]
pub struct InMemoryTaskQueue {
    pending: Mutex<VecDeque<Task>>,
    outcomes: Mutex<Vec<TaskOutcome>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: Task) {
        self.pending.lock().push_back(task);
    }

    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Outcomes received so far, in reporting order
    pub fn outcomes(&self) -> Vec<TaskOutcome> {
        self.outcomes.lock().clone()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn poll(&self) -> Option<Task> {
        self.pending.lock().pop_front()
    }

    async fn report(&self, outcome: TaskOutcome) -> Result<()> {
        self.outcomes.lock().push(outcome);
        Ok(())
    }
}
