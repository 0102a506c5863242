//! Error types for scanflow-storage

use std::fmt;
use thiserror::Error;

/// Storage error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Database errors (SQLite)
    Database,
    /// Serialization/deserialization errors
    Serialization,
    /// Component not found
    ComponentNotFound,
    /// Invalid filter, request or paging parameter
    Validation,
    /// Repository failure while running a query
    QueryExecution,
    /// Caller lacks the required permission
    InsufficientPrivileges,
    /// Transaction errors
    Transaction,
    /// Configuration errors
    Config,
    /// I/O errors
    IO,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Database => "database",
            ErrorKind::Serialization => "serialization",
            ErrorKind::ComponentNotFound => "component_not_found",
            ErrorKind::Validation => "validation",
            ErrorKind::QueryExecution => "query_execution",
            ErrorKind::InsufficientPrivileges => "insufficient_privileges",
            ErrorKind::Transaction => "transaction",
            ErrorKind::Config => "config",
            ErrorKind::IO => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct StorageError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // Convenience constructors
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn component_not_found(component: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::ComponentNotFound,
            format!("Component not found: {}", component.into()),
        )
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn insufficient_privileges() -> Self {
        Self::new(ErrorKind::InsufficientPrivileges, "Insufficient privileges")
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transaction, message)
    }

    /// Re-tag a repository failure as a query execution failure, keeping the
    /// original error as source
    pub fn into_query_execution(self) -> Self {
        if self.kind == ErrorKind::QueryExecution {
            return self;
        }
        let message = format!("Query execution failed: {}", self.message);
        StorageError::new(ErrorKind::QueryExecution, message).with_source(self)
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }
}

// SQLite error conversions
#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::database(format!("SQLite error: {}", err)).with_source(err)
    }
}

// JSON error conversions
impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::serialization(format!("JSON error: {}", err)).with_source(err)
    }
}

// A pattern supplied by the caller that does not compile
impl From<regex::Error> for StorageError {
    fn from(err: regex::Error) -> Self {
        StorageError::validation(format!("Invalid pattern: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, StorageError>;
