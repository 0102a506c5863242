//! SQLite repository
//!
//! One connection behind a mutex; a session holds the lock for its whole
//! lifetime and releases it when dropped.

mod schema;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{
    ComponentDto, ComponentTreeQuery, ComponentWithSnapshot, DbSession, FileSourceRecord,
    MeasureFilterRow, Metric, MetricType, PersistStats, Repository, SnapshotDto, SortValue,
    TreeSortField,
};
use crate::measure::sql::{escape_like, placeholders};
use crate::measure::{MeasureFilterSql, SqlParam};
use crate::{Result, StorageError};

const COMPONENT_COLUMNS: &str = "c.id, c.uuid, c.kee, c.name, c.qualifier, c.scope, c.path, \
     c.description, c.project_uuid, c.copy_component_id, c.enabled";

const SNAPSHOT_COLUMNS: &str = "s.id, s.component_id, s.root_snapshot_id, s.parent_snapshot_id, \
     s.path, s.depth, s.qualifier, s.scope, s.created_at, s.islast";

/// SQLite-backed [`Repository`]
#[derive(Clone)]
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Open (or create) the database at `path`; `:memory:` is accepted
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "opened SQLite repository");
        Self::from_connection(conn)
    }

    /// Create an in-memory repository (for testing)
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(schema::SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` on the raw connection, outside of any session
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock();
        Ok(f(&mut conn)?)
    }
}

impl Repository for SqliteRepository {
    fn open_session(&self) -> Result<Box<dyn DbSession + '_>> {
        Ok(Box::new(SqliteSession {
            conn: self.conn.lock(),
        }))
    }
}

/// Session on a [`SqliteRepository`]; the connection lock is the session
pub struct SqliteSession<'a> {
    conn: MutexGuard<'a, Connection>,
}

impl SqliteSession<'_> {
    fn select_components(&self, sql: &str, values: &[Value]) -> Result<Vec<ComponentDto>> {
        let mut stmt = self.conn.prepare(sql)?;
        let components = stmt
            .query_map(params_from_iter(values.iter()), component_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(components)
    }

    fn select_tree(&self, query: &ComponentTreeQuery, direct: bool) -> Result<Vec<ComponentWithSnapshot>> {
        let (where_clause, mut values) = tree_where(query, direct);
        let sql = format!(
            "SELECT {}, s.id FROM components c INNER JOIN snapshots s ON s.component_id = c.id {} ORDER BY {} LIMIT ? OFFSET ?",
            COMPONENT_COLUMNS,
            where_clause,
            tree_order(query)
        );
        values.push(Value::Integer(query.page_size as i64));
        values.push(Value::Integer(query.offset() as i64));

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(ComponentWithSnapshot {
                    component: component_from_row(row)?,
                    snapshot_id: row.get(11)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn count_tree(&self, query: &ComponentTreeQuery, direct: bool) -> Result<u64> {
        let (where_clause, values) = tree_where(query, direct);
        let sql = format!(
            "SELECT COUNT(*) FROM components c INNER JOIN snapshots s ON s.component_id = c.id {}",
            where_clause
        );
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn select_snapshot(&self, condition: &str, value: Value) -> Result<Option<SnapshotDto>> {
        let sql = format!(
            "SELECT {} FROM snapshots s INNER JOIN components c ON c.id = s.component_id \
             WHERE {} AND s.islast = 1 ORDER BY s.created_at DESC LIMIT 1",
            SNAPSHOT_COLUMNS, condition
        );
        let snapshot = self
            .conn
            .query_row(&sql, [value], snapshot_from_row)
            .optional()?;
        Ok(snapshot)
    }
}

impl DbSession for SqliteSession<'_> {
    fn select_component_by_uuid(&mut self, uuid: &str) -> Result<Option<ComponentDto>> {
        let sql = format!("SELECT {} FROM components c WHERE c.uuid = ?1", COMPONENT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![uuid], component_from_row)
            .optional()?)
    }

    fn select_component_by_key(&mut self, key: &str) -> Result<Option<ComponentDto>> {
        let sql = format!("SELECT {} FROM components c WHERE c.kee = ?1", COMPONENT_COLUMNS);
        Ok(self
            .conn
            .query_row(&sql, params![key], component_from_row)
            .optional()?)
    }

    fn select_by_ids(&mut self, ids: &[i64]) -> Result<Vec<ComponentDto>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM components c WHERE c.id IN ({})",
            COMPONENT_COLUMNS,
            placeholders(ids.len())
        );
        let values: Vec<Value> = ids.iter().map(|id| Value::Integer(*id)).collect();
        self.select_components(&sql, &values)
    }

    fn select_last_snapshot(&mut self, resource_key: &str) -> Result<Option<SnapshotDto>> {
        self.select_snapshot("c.kee = ?1", Value::Text(resource_key.to_string()))
    }

    fn select_last_snapshot_by_component_id(
        &mut self,
        component_id: i64,
    ) -> Result<Option<SnapshotDto>> {
        self.select_snapshot("s.component_id = ?1", Value::Integer(component_id))
    }

    fn select_direct_children(
        &mut self,
        query: &ComponentTreeQuery,
    ) -> Result<Vec<ComponentWithSnapshot>> {
        self.select_tree(query, true)
    }

    fn select_all_children(
        &mut self,
        query: &ComponentTreeQuery,
    ) -> Result<Vec<ComponentWithSnapshot>> {
        self.select_tree(query, false)
    }

    fn count_direct_children(&mut self, query: &ComponentTreeQuery) -> Result<u64> {
        self.count_tree(query, true)
    }

    fn count_all_children(&mut self, query: &ComponentTreeQuery) -> Result<u64> {
        self.count_tree(query, false)
    }

    fn select_enabled_metrics(&mut self) -> Result<Vec<Metric>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, short_name, val_type, enabled FROM metrics WHERE enabled = 1 ORDER BY id",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        raw.into_iter()
            .map(|(id, key, name, val_type, enabled)| {
                let value_type = MetricType::from_str(&val_type).ok_or_else(|| {
                    StorageError::serialization(format!(
                        "Unknown value type '{}' for metric {}",
                        val_type, key
                    ))
                })?;
                Ok(Metric {
                    id,
                    key,
                    name,
                    value_type,
                    enabled,
                })
            })
            .collect()
    }

    fn execute_measure_filter(&mut self, sql: &MeasureFilterSql) -> Result<Vec<MeasureFilterRow>> {
        let values: Vec<Value> = sql
            .params()
            .iter()
            .map(|p| match p {
                SqlParam::Int(i) => Value::Integer(*i),
                SqlParam::Real(f) => Value::Real(*f),
                SqlParam::Text(s) => Value::Text(s.clone()),
            })
            .collect();

        let mut stmt = self.conn.prepare(sql.sql())?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                let sort_value = match row.get::<_, Value>(7)? {
                    Value::Integer(i) => Some(SortValue::Numeric(i as f64)),
                    Value::Real(f) => Some(SortValue::Numeric(f)),
                    Value::Text(s) => Some(SortValue::Text(s)),
                    Value::Null | Value::Blob(_) => None,
                };
                Ok(MeasureFilterRow {
                    snapshot_id: row.get(0)?,
                    resource_id: row.get(1)?,
                    root_snapshot_id: row.get(2)?,
                    resource_key: row.get(3)?,
                    resource_name: row.get(4)?,
                    qualifier: row.get(5)?,
                    created_at: row.get(6)?,
                    sort_value,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn select_groups_by_logins(
        &mut self,
        logins: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        if logins.is_empty() {
            return Ok(groups);
        }
        let sql = format!(
            "SELECT u.login, g.name FROM users u \
             INNER JOIN groups_users gu ON gu.user_id = u.id \
             INNER JOIN user_groups g ON g.id = gu.group_id \
             WHERE u.login IN ({}) ORDER BY u.login, g.name",
            placeholders(logins.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(logins.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (login, group) = row?;
            groups.entry(login).or_default().push(group);
        }
        Ok(groups)
    }

    fn count_tokens_by_logins(&mut self, logins: &[String]) -> Result<HashMap<String, u32>> {
        if logins.is_empty() {
            return Ok(HashMap::new());
        }
        let sql = format!(
            "SELECT login, COUNT(*) FROM user_tokens WHERE login IN ({}) GROUP BY login",
            placeholders(logins.len())
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let counts = stmt
            .query_map(params_from_iter(logins.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(counts)
    }

    fn select_file_source(&mut self, component_key: &str) -> Result<Option<FileSourceRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT project_key, component_key, line_count, line_data, data_hash, revision,
                        last_change_date, analysis_date, updated_at
                 FROM file_sources WHERE component_key = ?1",
                params![component_key],
                |row| {
                    Ok(FileSourceRecord {
                        project_key: row.get(0)?,
                        component_key: row.get(1)?,
                        line_count: row.get(2)?,
                        line_data: row.get(3)?,
                        data_hash: row.get(4)?,
                        revision: row.get(5)?,
                        last_change_date: row.get(6)?,
                        analysis_date: row.get(7)?,
                        updated_at: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    fn persist_file_sources(&mut self, records: &[FileSourceRecord]) -> Result<PersistStats> {
        let tx = self.conn.transaction()?;
        let mut stats = PersistStats::default();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO file_sources (project_key, component_key, line_count, line_data,
                     data_hash, revision, last_change_date, analysis_date, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(component_key) DO UPDATE SET
                     project_key = excluded.project_key,
                     line_count = excluded.line_count,
                     line_data = excluded.line_data,
                     data_hash = excluded.data_hash,
                     revision = excluded.revision,
                     last_change_date = excluded.last_change_date,
                     analysis_date = excluded.analysis_date,
                     updated_at = excluded.updated_at
                 WHERE file_sources.data_hash <> excluded.data_hash",
            )?;
            for record in records {
                let changed = stmt.execute(params![
                    &record.project_key,
                    &record.component_key,
                    record.line_count,
                    &record.line_data,
                    &record.data_hash,
                    &record.revision,
                    record.last_change_date,
                    record.analysis_date,
                    record.updated_at,
                ])?;
                if changed > 0 {
                    stats.written += 1;
                } else {
                    stats.unchanged += 1;
                }
            }
        }
        tx.commit().map_err(|e| {
            StorageError::transaction(format!("Failed to commit file sources: {}", e)).with_source(e)
        })?;

        debug!(
            written = stats.written,
            unchanged = stats.unchanged,
            "persisted file sources"
        );
        Ok(stats)
    }
}

fn component_from_row(row: &Row<'_>) -> rusqlite::Result<ComponentDto> {
    Ok(ComponentDto {
        id: row.get(0)?,
        uuid: row.get(1)?,
        key: row.get(2)?,
        name: row.get(3)?,
        qualifier: row.get(4)?,
        scope: row.get(5)?,
        path: row.get(6)?,
        description: row.get(7)?,
        project_uuid: row.get(8)?,
        copy_component_id: row.get(9)?,
        enabled: row.get(10)?,
    })
}

fn snapshot_from_row(row: &Row<'_>) -> rusqlite::Result<SnapshotDto> {
    Ok(SnapshotDto {
        id: row.get(0)?,
        component_id: row.get(1)?,
        root_snapshot_id: row.get(2)?,
        parent_snapshot_id: row.get(3)?,
        path: row.get(4)?,
        depth: row.get(5)?,
        qualifier: row.get(6)?,
        scope: row.get(7)?,
        created_at: row.get(8)?,
        last: row.get(9)?,
    })
}

/// `WHERE` clause shared by the select and count tree queries
fn tree_where(query: &ComponentTreeQuery, direct: bool) -> (String, Vec<Value>) {
    let base = &query.base_snapshot;
    let mut sql = String::from("WHERE c.enabled = 1");
    let mut values = Vec::new();

    if direct {
        sql.push_str(" AND s.parent_snapshot_id = ?");
        values.push(Value::Integer(base.id));
    } else {
        sql.push_str(" AND s.root_snapshot_id = ? AND s.path LIKE ? ESCAPE '\\'");
        values.push(Value::Integer(base.root_id()));
        values.push(Value::Text(format!(
            "{}%",
            escape_like(&base.descendants_path())
        )));
    }

    match &query.qualifiers {
        Some(qualifiers) if qualifiers.is_empty() => sql.push_str(" AND 1 = 0"),
        Some(qualifiers) => {
            sql.push_str(&format!(" AND c.qualifier IN ({})", placeholders(qualifiers.len())));
            values.extend(qualifiers.iter().cloned().map(Value::Text));
        }
        None => {}
    }

    if let Some(text) = &query.name_or_key_query {
        sql.push_str(" AND (LOWER(c.name) LIKE ? ESCAPE '\\' OR c.kee = ?)");
        values.push(Value::Text(format!(
            "%{}%",
            escape_like(&text.to_lowercase())
        )));
        values.push(Value::Text(text.clone()));
    }

    (sql, values)
}

fn tree_order(query: &ComponentTreeQuery) -> String {
    let dir = if query.asc { "ASC" } else { "DESC" };
    let mut terms: Vec<String> = query
        .sort_fields
        .iter()
        .map(|field| match field {
            TreeSortField::Name => format!("LOWER(c.name) {dir}, c.name {dir}"),
            TreeSortField::Path => format!("LOWER(c.path) {dir}, c.path {dir}"),
            TreeSortField::Qualifier => format!("c.qualifier {dir}"),
        })
        .collect();
    terms.push("c.id ASC".to_string());
    terms.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let repo = SqliteRepository::in_memory().unwrap();
        repo.with_connection(|conn| conn.execute_batch(schema::SCHEMA))
            .unwrap();
    }

    #[test]
    fn test_unknown_component() {
        let repo = SqliteRepository::in_memory().unwrap();
        let mut session = repo.open_session().unwrap();
        assert!(session.select_component_by_key("nope").unwrap().is_none());
        assert!(session.select_last_snapshot("nope").unwrap().is_none());
        assert!(session.select_by_ids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_empty_login_lists_skip_the_query() {
        let repo = SqliteRepository::in_memory().unwrap();
        let mut session = repo.open_session().unwrap();
        assert!(session.select_groups_by_logins(&[]).unwrap().is_empty());
        assert!(session.count_tokens_by_logins(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_metric_type_is_reported() {
        let repo = SqliteRepository::in_memory().unwrap();
        repo.with_connection(|conn| {
            conn.execute(
                "INSERT INTO metrics (id, name, short_name, val_type) VALUES (1, 'ncloc', 'Lines', 'WEIRD')",
                [],
            )
        })
        .unwrap();
        let err = repo
            .open_session()
            .unwrap()
            .select_enabled_metrics()
            .unwrap_err();
        assert!(err.message.contains("WEIRD"));
    }
}
