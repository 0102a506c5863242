//! Measure filter from request parameters
//!
//! Recognised parameters:
//!
//! | name | value |
//! |---|---|
//! | `base` | base component key |
//! | `onBaseComponents` | `true` to keep direct children of `base` only |
//! | `scopes`, `qualifiers` | comma-separated lists |
//! | `nameSearch` | case-insensitive name substring |
//! | `onFavourites` | `true` to keep the user's favourites only |
//! | `keyRegexp` | full-match pattern on component keys |
//! | `c<N>_metric`, `c<N>_op`, `c<N>_val`, `c<N>_period` | condition N, from 1 |
//! | `sort` | `name`, `key`, `qualifier`, `date` or `metric:<key>` |
//! | `asc`, `sortPeriod` | sort direction and variation period |
//! | `limit` | maximum number of rows |

use std::collections::HashMap;

use super::filter::{
    MeasureFilter, MeasureFilterCondition, MeasureFilterSort, Operator, SortField,
};
use crate::domain::{Metric, Repository};
use crate::{Result, StorageError};

/// Resolves metric keys against the enabled metrics
#[derive(Debug, Clone, Default)]
pub struct MeasureFilterFactory {
    metrics: HashMap<String, Metric>,
}

impl MeasureFilterFactory {
    pub fn new(metrics: impl IntoIterator<Item = Metric>) -> Self {
        let metrics = metrics
            .into_iter()
            .filter(|m| m.enabled)
            .map(|m| (m.key.clone(), m))
            .collect();
        Self { metrics }
    }

    /// Load the enabled metrics in one session
    pub fn load(repository: &dyn Repository) -> Result<Self> {
        let metrics = repository.open_session()?.select_enabled_metrics()?;
        Ok(Self::new(metrics))
    }

    pub fn metric(&self, key: &str) -> Option<&Metric> {
        self.metrics.get(key)
    }

    /// Build a filter. Unknown metric keys leave the condition or sort
    /// unresolved, which makes the filter invalid at execution time;
    /// malformed values are rejected here.
    pub fn create(&self, params: &HashMap<String, String>) -> Result<MeasureFilter> {
        let get = |name: &str| {
            params
                .get(name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let mut filter = MeasureFilter {
            base_resource_key: get("base").map(str::to_string),
            on_base_resource_children: parse_bool(get("onBaseComponents"), "onBaseComponents")?,
            resource_scopes: parse_list(get("scopes")),
            resource_qualifiers: parse_list(get("qualifiers")),
            resource_key_regex: get("keyRegexp").map(str::to_string),
            resource_name: get("nameSearch").map(str::to_string),
            user_favourites: parse_bool(get("onFavourites"), "onFavourites")?,
            limit: get("limit")
                .map(|v| parse_number::<u32>(v, "limit"))
                .transpose()?,
            ..MeasureFilter::default()
        };

        let mut index = 1;
        while let Some(metric_key) = get(&format!("c{}_metric", index)) {
            let op = get(&format!("c{}_op", index)).unwrap_or("eq");
            let operator = Operator::from_code(op).ok_or_else(|| {
                StorageError::validation(format!("Unknown operator '{}' in condition {}", op, index))
            })?;
            let value_name = format!("c{}_val", index);
            let value = get(&value_name)
                .ok_or_else(|| StorageError::validation(format!("Missing parameter '{}'", value_name)))
                .and_then(|v| parse_number::<f64>(v, &value_name))?;

            let mut condition =
                MeasureFilterCondition::new(self.metric(metric_key).cloned(), operator, value);
            let period_name = format!("c{}_period", index);
            if let Some(period) = get(&period_name) {
                condition = condition.with_period(parse_number(period, &period_name)?);
            }
            filter.measure_conditions.push(condition);
            index += 1;
        }

        filter.sort = self.sort(get("sort"), get("asc"), get("sortPeriod"))?;
        Ok(filter)
    }

    fn sort(
        &self,
        sort: Option<&str>,
        asc: Option<&str>,
        period: Option<&str>,
    ) -> Result<MeasureFilterSort> {
        let mut result = MeasureFilterSort::default();
        if let Some(sort) = sort {
            match sort.strip_prefix("metric:") {
                Some(metric_key) => {
                    result.field = SortField::Metric;
                    result.metric = self.metric(metric_key).cloned();
                }
                None => {
                    result.field = SortField::from_str(sort).ok_or_else(|| {
                        StorageError::validation(format!("Unknown sort field '{}'", sort))
                    })?;
                }
            }
        }
        if asc.is_some() {
            result.asc = parse_bool(asc, "asc")?;
        }
        result.period = period
            .map(|p| parse_number(p, "sortPeriod"))
            .transpose()?;
        Ok(result)
    }
}

fn parse_list(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_bool(value: Option<&str>, name: &str) -> Result<bool> {
    match value {
        None => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("true") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("false") => Ok(false),
        Some(v) => Err(StorageError::validation(format!(
            "Value of parameter '{}' must be true or false, got '{}'",
            name, v
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str, name: &str) -> Result<T> {
    value.parse::<T>().map_err(|_| {
        StorageError::validation(format!(
            "Value of parameter '{}' is not a valid number: '{}'",
            name, value
        ))
    })
}
