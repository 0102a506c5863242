//! Error types for scanflow-report

use thiserror::Error;

use crate::model::ComponentKey;

/// Report codec error
#[derive(Debug, Error)]
pub enum ReportError {
    /// Malformed or truncated input. Fatal to the task reading it.
    #[error("Corrupt report at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// The requested component section is not part of the report.
    #[error("Section not found: {key}")]
    SectionNotFound { key: ComponentKey },

    /// Caller handed the writer something the format cannot represent
    #[error("Invalid report input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ReportError {
    pub fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            offset,
            reason: reason.into(),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the caller may treat this as "no data" rather than a failure
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ReportError::SectionNotFound { .. })
    }

    /// Offset at which decoding failed, for corruption errors
    pub fn offset(&self) -> Option<u64> {
        match self {
            ReportError::Corrupt { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_display_carries_offset() {
        let err = ReportError::corrupt(42, "truncated string");
        assert_eq!(err.to_string(), "Corrupt report at offset 42: truncated string");
        assert_eq!(err.offset(), Some(42));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_section_not_found_is_recoverable() {
        let err = ReportError::SectionNotFound {
            key: ComponentKey::Ref(7),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.offset(), None);
        assert!(err.to_string().contains("ref:7"));
    }
}
