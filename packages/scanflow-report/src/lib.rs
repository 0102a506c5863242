//! scanflow-report - analysis report container
//!
//! A report is produced by a scanner run and consumed by the server-side
//! compute task. It holds one metadata record and one section per
//! line-bearing component, each independently addressable.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use scanflow_report::{write_report, read_component_section, ComponentKey};
//!
//! write_report(&path, &metadata, &sections)?;
//!
//! // Only the requested frame is decoded
//! let section = read_component_section(&path, ComponentKey::Ref(3))?;
//! ```

mod codec;
pub mod error;
pub mod model;
pub mod publisher;
pub mod reader;
pub mod writer;

pub use error::{ReportError, Result};
pub use model::{
    Changeset, ComponentKey, ComponentSection, Duplicate, Duplication, Line, Metadata, ScmInfo,
    TextRange,
};
pub use publisher::{MetadataPublisher, ProjectDefinition};
pub use reader::{read_component_section, read_metadata, ReportReader};
pub use writer::{write_report, ReportWriter};
