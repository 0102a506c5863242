//! Domain layer for the persisted analysis store
//!
//! # Domain Models
//!
//! - `ComponentDto`: a project, directory, file, view... (anything with a qualifier)
//! - `SnapshotDto`: one analysis of a component, linked into the snapshot tree
//! - `Metric`: a measurable quantity, referenced by measure filters
//! - `FileSourceRecord`: enriched source lines of one file
//!
//! # Port Traits
//!
//! - [`Repository`]: hands out short-lived [`DbSession`]s
//! - [`DbSession`]: synchronous, session-scoped reads and writes

pub mod ports;
pub mod resource_types;

use serde::{Deserialize, Serialize};

pub use ports::{ComponentTreeQuery, DbSession, PersistStats, Repository, TreeSortField};
pub use resource_types::{qualifiers, ResourceTypeTree};

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// A component as stored in the `components` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDto {
    pub id: i64,
    pub uuid: String,
    pub key: String,
    pub name: String,
    pub qualifier: String,
    pub scope: String,
    pub path: Option<String>,
    pub description: Option<String>,
    /// Uuid of the root project, `None` for roots
    pub project_uuid: Option<String>,
    /// Set when this component is a copy of another one (views, sub-views)
    pub copy_component_id: Option<i64>,
    pub enabled: bool,
}

impl ComponentDto {
    /// Uuid of the project owning this component (itself for roots)
    pub fn project_uuid(&self) -> &str {
        self.project_uuid.as_deref().unwrap_or(&self.uuid)
    }
}

/// A component together with the id of its last snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentWithSnapshot {
    pub component: ComponentDto,
    pub snapshot_id: i64,
}

/// One analysis of a component
///
/// Snapshots form a tree mirroring the component tree. `path` holds the ids
/// of all ancestor snapshots, dot-terminated (`"1.4."`), so every descendant
/// of snapshot `s` has a path starting with `s.descendants_path()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDto {
    pub id: i64,
    pub component_id: i64,
    /// `None` for the root snapshot of an analysis
    pub root_snapshot_id: Option<i64>,
    pub parent_snapshot_id: Option<i64>,
    pub path: Option<String>,
    pub depth: i32,
    pub qualifier: String,
    pub scope: String,
    /// Epoch millis
    pub created_at: i64,
    pub last: bool,
}

impl SnapshotDto {
    /// Id of the root snapshot of the analysis this snapshot belongs to
    pub fn root_id(&self) -> i64 {
        self.root_snapshot_id.unwrap_or(self.id)
    }

    /// Path prefix shared by every descendant snapshot
    pub fn descendants_path(&self) -> String {
        format!("{}{}.", self.path.as_deref().unwrap_or(""), self.id)
    }
}

/// Value type of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricType {
    Int,
    Float,
    Percent,
    Bool,
    Millisec,
    Rating,
    WorkDur,
    String,
    Data,
    Level,
    Distrib,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Int => "INT",
            MetricType::Float => "FLOAT",
            MetricType::Percent => "PERCENT",
            MetricType::Bool => "BOOL",
            MetricType::Millisec => "MILLISEC",
            MetricType::Rating => "RATING",
            MetricType::WorkDur => "WORK_DUR",
            MetricType::String => "STRING",
            MetricType::Data => "DATA",
            MetricType::Level => "LEVEL",
            MetricType::Distrib => "DISTRIB",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INT" => Some(MetricType::Int),
            "FLOAT" => Some(MetricType::Float),
            "PERCENT" => Some(MetricType::Percent),
            "BOOL" => Some(MetricType::Bool),
            "MILLISEC" => Some(MetricType::Millisec),
            "RATING" => Some(MetricType::Rating),
            "WORK_DUR" => Some(MetricType::WorkDur),
            "STRING" => Some(MetricType::String),
            "DATA" => Some(MetricType::Data),
            "LEVEL" => Some(MetricType::Level),
            "DISTRIB" => Some(MetricType::Distrib),
            _ => None,
        }
    }

    /// Numeric metrics store their value in `value`, the others in `text_value`
    pub fn is_numeric(&self) -> bool {
        !matches!(
            self,
            MetricType::String | MetricType::Data | MetricType::Level | MetricType::Distrib
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub value_type: MetricType,
    pub enabled: bool,
}

/// Sort value carried by a measure filter row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SortValue {
    Numeric(f64),
    Text(String),
}

/// One row returned by a measure filter query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureFilterRow {
    pub snapshot_id: i64,
    pub resource_id: i64,
    pub root_snapshot_id: Option<i64>,
    pub resource_key: String,
    pub resource_name: String,
    pub qualifier: String,
    /// Epoch millis of the snapshot
    pub created_at: i64,
    pub sort_value: Option<SortValue>,
}

/// Enriched source of one file, as persisted by the compute task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSourceRecord {
    pub project_key: String,
    pub component_key: String,
    pub line_count: u32,
    /// JSON array of enriched lines
    pub line_data: String,
    /// Hex SHA-256 of `line_data`
    pub data_hash: String,
    pub revision: Option<String>,
    /// Epoch millis of the latest change
    pub last_change_date: Option<i64>,
    pub analysis_date: i64,
    pub updated_at: i64,
}
