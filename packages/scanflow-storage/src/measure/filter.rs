//! Measure filter model

use serde::Serialize;

use crate::domain::{Metric, SnapshotDto};

/// Highest differential period stored next to a measure value
pub const MAX_PERIOD: i32 = 5;

/// Comparison operator of a measure condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operator {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Operator {
    pub fn sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
        }
    }

    /// Parse the request code (`eq`, `lt`, `lte`, `gt`, `gte`)
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "eq" => Some(Operator::Eq),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            _ => None,
        }
    }
}

/// `metric <op> value`, optionally on the variation over a period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureFilterCondition {
    /// `None` when the requested metric could not be resolved
    pub metric: Option<Metric>,
    pub operator: Operator,
    pub value: f64,
    pub period: Option<i32>,
}

impl MeasureFilterCondition {
    pub fn new(metric: Option<Metric>, operator: Operator, value: f64) -> Self {
        Self {
            metric,
            operator,
            value,
            period: None,
        }
    }

    pub fn with_period(mut self, period: i32) -> Self {
        self.period = Some(period);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SortField {
    Key,
    Name,
    Qualifier,
    Date,
    Metric,
}

impl SortField {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "key" => Some(SortField::Key),
            "name" => Some(SortField::Name),
            "qualifier" => Some(SortField::Qualifier),
            "date" => Some(SortField::Date),
            "metric" => Some(SortField::Metric),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureFilterSort {
    pub field: SortField,
    pub asc: bool,
    /// Required when sorting on measures
    pub metric: Option<Metric>,
    pub period: Option<i32>,
}

impl Default for MeasureFilterSort {
    fn default() -> Self {
        Self {
            field: SortField::Name,
            asc: true,
            metric: None,
            period: None,
        }
    }
}

impl MeasureFilterSort {
    pub fn on_measures(&self) -> bool {
        self.field == SortField::Metric
    }
}

/// Declarative search over the last snapshots of components
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasureFilter {
    pub base_resource_key: Option<String>,
    pub on_base_resource_children: bool,
    pub resource_scopes: Vec<String>,
    pub resource_qualifiers: Vec<String>,
    /// Full-match pattern on the resource key, applied after the query
    pub resource_key_regex: Option<String>,
    /// Case-insensitive name substring
    pub resource_name: Option<String>,
    pub user_favourites: bool,
    pub measure_conditions: Vec<MeasureFilterCondition>,
    pub sort: MeasureFilterSort,
    /// Maximum number of rows returned by the query
    pub limit: Option<u32>,
}

impl MeasureFilter {
    /// A filter that selects nothing in particular is never executed
    pub fn is_empty(&self) -> bool {
        self.resource_qualifiers.is_empty()
            && self.resource_scopes.is_empty()
            && self
                .base_resource_key
                .as_deref()
                .map_or(true, |k| k.trim().is_empty())
            && !self.user_favourites
    }

    pub fn base_resource_key(&self) -> Option<&str> {
        self.base_resource_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
    }
}

/// Evaluation state of one execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasureFilterContext {
    pub user_id: Option<i64>,
    pub base_snapshot: Option<SnapshotDto>,
    /// Query text, for diagnostics. Only set when a query actually ran.
    pub sql: Option<String>,
}

impl MeasureFilterContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_user(user_id: i64) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }
}

/// Whether `filter` can run given the resolved `context`
pub fn is_valid(filter: &MeasureFilter, context: &MeasureFilterContext) -> bool {
    let base_resolved = context.base_snapshot.is_some();

    let mut valid = filter.base_resource_key().is_none() || base_resolved;
    valid &= !(filter.on_base_resource_children && !base_resolved);
    valid &= !(filter.user_favourites && context.user_id.is_none());
    valid &= filter
        .measure_conditions
        .iter()
        .all(|c| c.metric.is_some() && period_is_valid(c.period));
    if filter.sort.on_measures() {
        valid &= filter.sort.metric.is_some();
    }
    valid &= period_is_valid(filter.sort.period);
    valid
}

fn period_is_valid(period: Option<i32>) -> bool {
    period.map_or(true, |p| (1..=MAX_PERIOD).contains(&p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MetricType;

    fn ncloc() -> Metric {
        Metric {
            id: 1,
            key: "ncloc".to_string(),
            name: "Lines of code".to_string(),
            value_type: MetricType::Int,
            enabled: true,
        }
    }

    fn projects() -> MeasureFilter {
        MeasureFilter {
            resource_qualifiers: vec!["TRK".to_string()],
            ..MeasureFilter::default()
        }
    }

    fn base_snapshot() -> SnapshotDto {
        SnapshotDto {
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
        }
    }

    #[test]
    fn test_default_filter_is_empty() {
        assert!(MeasureFilter::default().is_empty());
        let blank_base = MeasureFilter {
            base_resource_key: Some("  ".to_string()),
            ..MeasureFilter::default()
        };
        assert!(blank_base.is_empty());
    }

    #[test]
    fn test_any_criterion_makes_filter_non_empty() {
        assert!(!projects().is_empty());
        assert!(!MeasureFilter {
            user_favourites: true,
            ..MeasureFilter::default()
        }
        .is_empty());
        assert!(!MeasureFilter {
            base_resource_key: Some("foo".to_string()),
            ..MeasureFilter::default()
        }
        .is_empty());
    }

    #[test]
    fn test_favourites_without_user_is_invalid() {
        let filter = MeasureFilter {
            user_favourites: true,
            ..MeasureFilter::default()
        };
        assert!(!is_valid(&filter, &MeasureFilterContext::new()));
        assert!(is_valid(&filter, &MeasureFilterContext::for_user(12)));
    }

    #[test]
    fn test_unresolved_base_is_invalid() {
        let filter = MeasureFilter {
            base_resource_key: Some("foo".to_string()),
            ..MeasureFilter::default()
        };
        let mut context = MeasureFilterContext::new();
        assert!(!is_valid(&filter, &context));
        context.base_snapshot = Some(base_snapshot());
        assert!(is_valid(&filter, &context));
    }

    #[test]
    fn test_children_require_base_snapshot() {
        let filter = MeasureFilter {
            on_base_resource_children: true,
            ..projects()
        };
        assert!(!is_valid(&filter, &MeasureFilterContext::new()));
    }

    #[test]
    fn test_condition_period() {
        let mut filter = projects();
        filter.measure_conditions =
            vec![MeasureFilterCondition::new(Some(ncloc()), Operator::Gt, 10.0).with_period(0)];
        assert!(!is_valid(&filter, &MeasureFilterContext::new()));

        filter.measure_conditions =
            vec![MeasureFilterCondition::new(Some(ncloc()), Operator::Gt, 10.0).with_period(1)];
        assert!(is_valid(&filter, &MeasureFilterContext::new()));
    }

    #[test]
    fn test_unresolved_condition_metric_is_invalid() {
        let mut filter = projects();
        filter.measure_conditions = vec![MeasureFilterCondition::new(None, Operator::Eq, 1.0)];
        assert!(!is_valid(&filter, &MeasureFilterContext::new()));
    }

    #[test]
    fn test_measure_sort_requires_metric_and_valid_period() {
        let mut filter = projects();
        filter.sort = MeasureFilterSort {
            field: SortField::Metric,
            asc: false,
            metric: None,
            period: None,
        };
        assert!(!is_valid(&filter, &MeasureFilterContext::new()));

        filter.sort.metric = Some(ncloc());
        assert!(is_valid(&filter, &MeasureFilterContext::new()));

        filter.sort.period = Some(0);
        assert!(!is_valid(&filter, &MeasureFilterContext::new()));
    }
}
