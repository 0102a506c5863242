use crate::error::{ComputeError, ErrorCategory, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Container lifecycle: `Created -> Running -> (Completed | Failed) -> Cleaned`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContainerState {
    Created {
        created_at: DateTime<Utc>,
    },
    Running {
        started_at: DateTime<Utc>,
    },
    Completed {
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
        duration_ms: u64,
    },
    Failed {
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
        error: String,
        error_category: ErrorCategory,
    },
    Cleaned {
        cleaned_at: DateTime<Utc>,
        /// Whether the container reached `Completed` before cleanup
        succeeded: bool,
    },
}

impl ContainerState {
    pub fn state_name(&self) -> &'static str {
        match self {
            ContainerState::Created { .. } => "created",
            ContainerState::Running { .. } => "running",
            ContainerState::Completed { .. } => "completed",
            ContainerState::Failed { .. } => "failed",
            ContainerState::Cleaned { .. } => "cleaned",
        }
    }

    /// Completed or Failed
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ContainerState::Completed { .. } | ContainerState::Failed { .. }
        )
    }
}

/// State machine guarding container transitions
#[derive(Debug)]
pub struct ContainerStateMachine {
    state: ContainerState,
}

impl Default for ContainerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerStateMachine {
    pub fn new() -> Self {
        Self {
            state: ContainerState::Created {
                created_at: Utc::now(),
            },
        }
    }

    pub fn state(&self) -> &ContainerState {
        &self.state
    }

    fn invalid(&self, to: &str) -> ComputeError {
        ComputeError::InvalidStateTransition {
            from: self.state.state_name().to_string(),
            to: to.to_string(),
        }
    }

    /// Transition: CREATED → RUNNING
    pub fn start(&mut self) -> Result<()> {
        match &self.state {
            ContainerState::Created { .. } => {
                self.state = ContainerState::Running {
                    started_at: Utc::now(),
                };
                Ok(())
            }
            _ => Err(self.invalid("running")),
        }
    }

    /// Transition: RUNNING → COMPLETED
    pub fn complete(&mut self) -> Result<()> {
        match &self.state {
            ContainerState::Running { started_at } => {
                let now = Utc::now();
                let duration_ms = (now - *started_at).num_milliseconds().max(0) as u64;
                self.state = ContainerState::Completed {
                    started_at: *started_at,
                    completed_at: now,
                    duration_ms,
                };
                Ok(())
            }
            _ => Err(self.invalid("completed")),
        }
    }

    /// Transition: RUNNING → FAILED
    pub fn fail(&mut self, error: String, error_category: ErrorCategory) -> Result<()> {
        match &self.state {
            ContainerState::Running { started_at } => {
                self.state = ContainerState::Failed {
                    started_at: *started_at,
                    failed_at: Utc::now(),
                    error,
                    error_category,
                };
                Ok(())
            }
            _ => Err(self.invalid("failed")),
        }
    }

    /// Transition: COMPLETED | FAILED → CLEANED
    pub fn clean(&mut self) -> Result<()> {
        if !self.state.is_terminal() {
            return Err(self.invalid("cleaned"));
        }
        let succeeded = matches!(self.state, ContainerState::Completed { .. });
        self.state = ContainerState::Cleaned {
            cleaned_at: Utc::now(),
            succeeded,
        };
        Ok(())
    }

    /// Elapsed time of the run, once terminal
    pub fn duration_ms(&self) -> u64 {
        match &self.state {
            ContainerState::Completed { duration_ms, .. } => *duration_ms,
            ContainerState::Failed {
                started_at,
                failed_at,
                ..
            } => (*failed_at - *started_at).num_milliseconds().max(0) as u64,
            _ => 0,
        }
    }
}
