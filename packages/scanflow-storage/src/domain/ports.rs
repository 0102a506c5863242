//! Repository port
//!
//! The store is reached through short-lived sessions: a [`Repository`] opens
//! one [`DbSession`] per operation and the session is released when it is
//! dropped, on every exit path. All operations are synchronous; callers on
//! an async runtime must not hold a session across an `.await`.
//!
//! # Examples
//!
//! ```rust,ignore
//! use scanflow_storage::domain::Repository;
//!
//! fn last_analysis(repo: &dyn Repository, key: &str) -> Result<Option<i64>> {
//!     let mut session = repo.open_session()?;
//!     Ok(session.select_last_snapshot(key)?.map(|s| s.created_at))
//! }   // session released here
//! ```

use std::collections::HashMap;

use super::{
    ComponentDto, ComponentWithSnapshot, FileSourceRecord, MeasureFilterRow, Metric, SnapshotDto,
};
use crate::measure::MeasureFilterSql;
use crate::Result;

/// Hands out sessions on the backing store
pub trait Repository: Send + Sync {
    /// Open a session; it is closed when the returned box is dropped
    fn open_session(&self) -> Result<Box<dyn DbSession + '_>>;
}

/// Session-scoped operations on the backing store
pub trait DbSession {
    // ═══════════════════════════════════════════════════════════════════════
    // Components & snapshots
    // ═══════════════════════════════════════════════════════════════════════

    fn select_component_by_uuid(&mut self, uuid: &str) -> Result<Option<ComponentDto>>;

    fn select_component_by_key(&mut self, key: &str) -> Result<Option<ComponentDto>>;

    /// Components with the given ids, in no particular order. Unknown ids are
    /// skipped.
    fn select_by_ids(&mut self, ids: &[i64]) -> Result<Vec<ComponentDto>>;

    /// Last snapshot of the component with the given key
    fn select_last_snapshot(&mut self, resource_key: &str) -> Result<Option<SnapshotDto>>;

    fn select_last_snapshot_by_component_id(
        &mut self,
        component_id: i64,
    ) -> Result<Option<SnapshotDto>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Component tree
    // ═══════════════════════════════════════════════════════════════════════

    /// One page of the direct children of the base snapshot
    fn select_direct_children(
        &mut self,
        query: &ComponentTreeQuery,
    ) -> Result<Vec<ComponentWithSnapshot>>;

    /// One page of all descendants of the base snapshot, base excluded
    fn select_all_children(
        &mut self,
        query: &ComponentTreeQuery,
    ) -> Result<Vec<ComponentWithSnapshot>>;

    fn count_direct_children(&mut self, query: &ComponentTreeQuery) -> Result<u64>;

    fn count_all_children(&mut self, query: &ComponentTreeQuery) -> Result<u64>;

    // ═══════════════════════════════════════════════════════════════════════
    // Measures
    // ═══════════════════════════════════════════════════════════════════════

    fn select_enabled_metrics(&mut self) -> Result<Vec<Metric>>;

    fn execute_measure_filter(&mut self, sql: &MeasureFilterSql) -> Result<Vec<MeasureFilterRow>>;

    // ═══════════════════════════════════════════════════════════════════════
    // Users
    // ═══════════════════════════════════════════════════════════════════════

    /// Group names per login, sorted by name. Logins without groups are absent.
    fn select_groups_by_logins(&mut self, logins: &[String])
        -> Result<HashMap<String, Vec<String>>>;

    /// Number of user tokens per login. Logins without tokens are absent.
    fn count_tokens_by_logins(&mut self, logins: &[String]) -> Result<HashMap<String, u32>>;

    // ═══════════════════════════════════════════════════════════════════════
    // File sources
    // ═══════════════════════════════════════════════════════════════════════

    fn select_file_source(&mut self, component_key: &str) -> Result<Option<FileSourceRecord>>;

    /// Write all records in one transaction. Either every record is visible
    /// afterwards or none is.
    fn persist_file_sources(&mut self, records: &[FileSourceRecord]) -> Result<PersistStats>;
}

/// Outcome of [`DbSession::persist_file_sources`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    /// Rows inserted or rewritten
    pub written: usize,
    /// Rows left untouched because their data hash did not change
    pub unchanged: usize,
}

/// Sort field of a component tree query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeSortField {
    Name,
    Path,
    Qualifier,
}

impl TreeSortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            TreeSortField::Name => "name",
            TreeSortField::Path => "path",
            TreeSortField::Qualifier => "qualifier",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "name" => Some(TreeSortField::Name),
            "path" => Some(TreeSortField::Path),
            "qualifier" => Some(TreeSortField::Qualifier),
            _ => None,
        }
    }
}

/// Query object for the component tree operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentTreeQuery {
    pub base_snapshot: SnapshotDto,
    /// Matches a name substring (case-insensitive) or an exact key
    pub name_or_key_query: Option<String>,
    /// `None` means any qualifier; `Some(vec![])` matches nothing
    pub qualifiers: Option<Vec<String>>,
    pub sort_fields: Vec<TreeSortField>,
    pub asc: bool,
    /// 1-based
    pub page: u32,
    pub page_size: u32,
}

impl ComponentTreeQuery {
    /// Number of rows skipped before the requested page
    pub fn offset(&self) -> u64 {
        (self.page.max(1) as u64 - 1) * self.page_size as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_is_zero_based() {
        let snapshot = SnapshotDto {
            id: 1,
            component_id: 1,
            root_snapshot_id: None,
            parent_snapshot_id: None,
            path: None,
            depth: 0,
            qualifier: "TRK".to_string(),
            scope: "PRJ".to_string(),
            created_at: 0,
            last: true,
        };
        let mut query = ComponentTreeQuery {
            base_snapshot: snapshot,
            name_or_key_query: None,
            qualifiers: None,
            sort_fields: vec![TreeSortField::Name],
            asc: true,
            page: 1,
            page_size: 100,
        };
        assert_eq!(query.offset(), 0);
        query.page = 3;
        assert_eq!(query.offset(), 200);
    }

    #[test]
    fn test_sort_field_parsing() {
        assert_eq!(TreeSortField::from_str("path"), Some(TreeSortField::Path));
        assert_eq!(TreeSortField::from_str("date"), None);
    }
}
