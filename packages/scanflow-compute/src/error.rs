use scanflow_report::ReportError;
use scanflow_storage::{ErrorKind, StorageError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ComputeError>;

#[derive(Error, Debug)]
pub enum ComputeError {
    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("cancelled")]
    Cancelled,

    #[error("Step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Step panicked: {0}")]
    StepPanicked(String),

    #[error("Resource scope already released, cannot track '{0}'")]
    ResourceReleased(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComputeError {
    pub fn step_failed(step: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::StepFailed {
            step: step.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config<E: std::fmt::Display>(e: E) -> Self {
        Self::Config(e.to_string())
    }

    /// Category handed to the queue owner along with a failed outcome
    pub fn category(&self) -> ErrorCategory {
        match self {
            ComputeError::Report(ReportError::Io(_)) => ErrorCategory::Infrastructure,
            ComputeError::Report(_) => ErrorCategory::Permanent,
            ComputeError::Storage(e) => match e.kind {
                ErrorKind::Database
                | ErrorKind::Transaction
                | ErrorKind::QueryExecution => ErrorCategory::Transient,
                ErrorKind::IO => ErrorCategory::Infrastructure,
                _ => ErrorCategory::Permanent,
            },
            ComputeError::StepPanicked(_) | ComputeError::Io(_) => ErrorCategory::Infrastructure,
            ComputeError::InvalidStateTransition { .. }
            | ComputeError::Cancelled
            | ComputeError::StepFailed { .. }
            | ComputeError::ResourceReleased(_)
            | ComputeError::Config(_) => ErrorCategory::Permanent,
        }
    }
}

/// Error category for the queue owner's retry decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorCategory {
    /// Transient error, a retry may succeed (e.g. locked database)
    Transient,
    /// Permanent error, retrying the same task fails again (e.g. corrupt report)
    Permanent,
    /// Infrastructure error, needs an operator (e.g. disk failure)
    Infrastructure,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "transient" => Ok(ErrorCategory::Transient),
            "permanent" => Ok(ErrorCategory::Permanent),
            "infrastructure" => Ok(ErrorCategory::Infrastructure),
            _ => Err(ComputeError::config(format!(
                "Invalid error category: {}",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_roundtrip() {
        for category in &[
            ErrorCategory::Transient,
            ErrorCategory::Permanent,
            ErrorCategory::Infrastructure,
        ] {
            let parsed = ErrorCategory::from_str(category.as_str()).unwrap();
            assert_eq!(*category, parsed);
        }
    }

    #[test]
    fn test_error_category_invalid() {
        assert!(ErrorCategory::from_str("invalid").is_err());
    }

    #[test]
    fn test_corrupt_report_is_permanent() {
        let err = ComputeError::from(ReportError::corrupt(12, "truncated frame"));
        assert_eq!(err.category(), ErrorCategory::Permanent);
        assert!(err.to_string().contains("offset 12"));
    }

    #[test]
    fn test_storage_categories() {
        let err = ComputeError::from(StorageError::transaction("commit failed"));
        assert_eq!(err.category(), ErrorCategory::Transient);

        let err = ComputeError::from(StorageError::validation("bad"));
        assert_eq!(err.category(), ErrorCategory::Permanent);
    }

    #[test]
    fn test_cancelled_and_panics() {
        assert_eq!(ComputeError::Cancelled.to_string(), "cancelled");
        assert_eq!(ComputeError::Cancelled.category(), ErrorCategory::Permanent);
        assert_eq!(
            ComputeError::StepPanicked("boom".into()).category(),
            ErrorCategory::Infrastructure
        );
    }
}
