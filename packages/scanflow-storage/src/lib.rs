//! scanflow-storage - persisted analysis data
//!
//! Everything here works against the [`Repository`] port; the SQLite
//! adapter is the only backend.
//!
//! ## Modules
//!
//! - [`measure`]: measure filters (validation, SQL compilation, execution)
//! - [`component`]: component tree navigation and caller permissions
//! - [`user`]: user identities and search enrichment
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scanflow_storage::{MeasureFilterExecutor, MeasureFilterFactory, SqliteRepository};
//!
//! let repository = Arc::new(SqliteRepository::open("scanflow.db")?);
//! let filter = MeasureFilterFactory::load(repository.as_ref())?.create(&params)?;
//! let rows = MeasureFilterExecutor::new(repository).execute(&filter, &mut context)?;
//! ```

pub mod component;
pub mod domain;
pub mod error;
pub mod measure;
pub mod user;

#[cfg(feature = "sqlite")]
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use component::{ComponentTreeService, StaticUserSession, TreeRequest, TreeResponse, UserSession};
pub use domain::{
    ComponentDto, DbSession, FileSourceRecord, MeasureFilterRow, Metric, PersistStats, Repository,
    ResourceTypeTree, SnapshotDto,
};
pub use measure::{MeasureFilter, MeasureFilterContext, MeasureFilterExecutor, MeasureFilterFactory};
pub use user::{UserIdentity, UserSearchEnricher};

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteRepository;
