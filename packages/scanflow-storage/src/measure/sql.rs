//! Measure filter to SQL (SQLite dialect)
//!
//! Only validated filters are compiled; see [`super::filter::is_valid`].
//! Every caller-supplied value is bound as a parameter, never inlined.

use super::filter::{MeasureFilter, MeasureFilterContext, SortField};
use crate::domain::Metric;

/// Bound parameter of a compiled query
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Real(f64),
    Text(String),
}

/// Property key marking a component as a user favourite
pub const FAVOURITE_PROPERTY: &str = "favourite";

/// Compiled measure filter
///
/// Selected columns, in order: snapshot id, component id, root snapshot id,
/// component key, component name, qualifier, snapshot date, sort value.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureFilterSql {
    sql: String,
    params: Vec<SqlParam>,
}

impl MeasureFilterSql {
    pub fn build(filter: &MeasureFilter, context: &MeasureFilterContext) -> Self {
        let mut builder = Builder::default();
        builder.select(filter);
        builder.from(filter);
        builder.where_clause(filter, context);
        builder.order_by(filter);
        if let Some(limit) = filter.limit {
            builder.sql.push_str(" LIMIT ?");
            builder.params.push(SqlParam::Int(limit as i64));
        }
        Self {
            sql: builder.sql,
            params: builder.params,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlParam] {
        &self.params
    }
}

#[derive(Default)]
struct Builder {
    sql: String,
    params: Vec<SqlParam>,
}

impl Builder {
    fn select(&mut self, filter: &MeasureFilter) {
        self.sql.push_str(
            "SELECT s.id, s.component_id, s.root_snapshot_id, c.kee, c.name, c.qualifier, s.created_at, ",
        );
        match filter.sort.metric.as_ref().filter(|_| filter.sort.on_measures()) {
            Some(metric) => {
                self.sql.push_str("sort_pm.");
                self.sql.push_str(&value_column(metric, filter.sort.period));
            }
            None => self.sql.push_str("NULL"),
        }
        self.sql.push_str(" AS sort_value");
    }

    fn from(&mut self, filter: &MeasureFilter) {
        self.sql
            .push_str(" FROM snapshots s INNER JOIN components c ON c.id = s.component_id");
        if let Some(metric) = filter.sort.metric.as_ref().filter(|_| filter.sort.on_measures()) {
            self.sql.push_str(
                " LEFT OUTER JOIN project_measures sort_pm ON sort_pm.snapshot_id = s.id AND sort_pm.metric_id = ?",
            );
            self.params.push(SqlParam::Int(metric.id));
        }
    }

    fn where_clause(&mut self, filter: &MeasureFilter, context: &MeasureFilterContext) {
        self.sql.push_str(" WHERE s.islast = 1 AND c.enabled = 1");

        if !filter.resource_qualifiers.is_empty() {
            self.sql.push_str(" AND s.qualifier IN (");
            self.text_list(&filter.resource_qualifiers);
            self.sql.push(')');
        }
        if !filter.resource_scopes.is_empty() {
            self.sql.push_str(" AND s.scope IN (");
            self.text_list(&filter.resource_scopes);
            self.sql.push(')');
        }

        if let Some(base) = &context.base_snapshot {
            if filter.on_base_resource_children {
                self.sql.push_str(" AND s.parent_snapshot_id = ?");
                self.params.push(SqlParam::Int(base.id));
            } else {
                self.sql
                    .push_str(" AND s.root_snapshot_id = ? AND s.path LIKE ? ESCAPE '\\'");
                self.params.push(SqlParam::Int(base.root_id()));
                self.params
                    .push(SqlParam::Text(format!("{}%", escape_like(&base.descendants_path()))));
            }
        }

        if filter.user_favourites {
            if let Some(user_id) = context.user_id {
                self.sql.push_str(
                    " AND c.id IN (SELECT p.resource_id FROM properties p WHERE p.prop_key = ? AND p.user_id = ?)",
                );
                self.params
                    .push(SqlParam::Text(FAVOURITE_PROPERTY.to_string()));
                self.params.push(SqlParam::Int(user_id));
            }
        }

        if let Some(name) = filter.resource_name.as_deref().filter(|n| !n.is_empty()) {
            self.sql.push_str(" AND LOWER(c.name) LIKE ? ESCAPE '\\'");
            self.params
                .push(SqlParam::Text(format!("%{}%", escape_like(&name.to_lowercase()))));
        }

        for condition in &filter.measure_conditions {
            let Some(metric) = &condition.metric else {
                continue;
            };
            self.sql.push_str(&format!(
                " AND s.id IN (SELECT pm.snapshot_id FROM project_measures pm WHERE pm.metric_id = ? AND pm.{} {} ?)",
                numeric_column(condition.period),
                condition.operator.sql()
            ));
            self.params.push(SqlParam::Int(metric.id));
            self.params.push(SqlParam::Real(condition.value));
        }
    }

    fn order_by(&mut self, filter: &MeasureFilter) {
        let dir = if filter.sort.asc { "ASC" } else { "DESC" };
        let order = match filter.sort.field {
            SortField::Key => format!("c.kee {}", dir),
            SortField::Name => format!("LOWER(c.name) {}, c.name {}", dir, dir),
            SortField::Qualifier => format!("c.qualifier {}", dir),
            SortField::Date => format!("s.created_at {}", dir),
            // Components without the measure always come last
            SortField::Metric => match &filter.sort.metric {
                Some(metric) => {
                    let column = format!("sort_pm.{}", value_column(metric, filter.sort.period));
                    format!("({} IS NULL) ASC, {} {}", column, column, dir)
                }
                None => format!("LOWER(c.name) {}", dir),
            },
        };
        self.sql.push_str(" ORDER BY ");
        self.sql.push_str(&order);
        self.sql.push_str(", s.id ASC");
    }

    fn text_list(&mut self, values: &[String]) {
        self.sql.push_str(&placeholders(values.len()));
        self.params
            .extend(values.iter().cloned().map(SqlParam::Text));
    }
}

/// `?, ?, ?` for `n` bound values
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Escape `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern
pub(crate) fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn numeric_column(period: Option<i32>) -> String {
    match period {
        Some(p) => format!("variation_value_{}", p),
        None => "value".to_string(),
    }
}

fn value_column(metric: &Metric, period: Option<i32>) -> String {
    if metric.value_type.is_numeric() || period.is_some() {
        numeric_column(period)
    } else {
        "text_value".to_string()
    }
}
