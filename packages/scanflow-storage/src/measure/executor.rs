//! Measure filter execution

use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};

use super::filter::{is_valid, MeasureFilter, MeasureFilterContext};
use super::sql::MeasureFilterSql;
use crate::domain::{DbSession, MeasureFilterRow, Repository};
use crate::{Result, StorageError};

/// Runs measure filters against the repository
///
/// # Usage
///
/// ```rust,ignore
/// let executor = MeasureFilterExecutor::new(repository.clone());
/// let mut context = MeasureFilterContext::for_user(user_id);
/// let rows = executor.execute(&filter, &mut context)?;
/// println!("{:?}", context.sql);
/// ```
#[derive(Clone)]
pub struct MeasureFilterExecutor {
    repository: Arc<dyn Repository>,
}

impl MeasureFilterExecutor {
    pub fn new(repository: Arc<dyn Repository>) -> Self {
        Self { repository }
    }

    /// Execute `filter`, recording the resolved base snapshot and the query
    /// text in `context`
    ///
    /// Empty and invalid filters yield no rows. A repository failure is a
    /// `QueryExecution` error; nothing is retried.
    pub fn execute(
        &self,
        filter: &MeasureFilter,
        context: &mut MeasureFilterContext,
    ) -> Result<Vec<MeasureFilterRow>> {
        if filter.is_empty() {
            return Ok(Vec::new());
        }
        let key_pattern = filter
            .resource_key_regex
            .as_deref()
            .map(|re| Regex::new(&format!("^(?:{})$", re)))
            .transpose()?;

        let rows = {
            let mut session = self
                .repository
                .open_session()
                .map_err(StorageError::into_query_execution)?;
            prepare_context(filter, context, session.as_mut())?;

            if is_valid(filter, context) {
                let sql = MeasureFilterSql::build(filter, context);
                context.sql = Some(sql.sql().to_string());
                debug!(sql = %sql.sql(), "executing measure filter");
                session
                    .execute_measure_filter(&sql)
                    .map_err(StorageError::into_query_execution)?
            } else {
                debug!("measure filter is not valid, skipping query");
                Vec::new()
            }
        };

        Ok(match key_pattern {
            Some(pattern) => rows
                .into_iter()
                .filter(|row| pattern.is_match(&row.resource_key))
                .collect(),
            None => rows,
        })
    }
}

fn prepare_context(
    filter: &MeasureFilter,
    context: &mut MeasureFilterContext,
    session: &mut dyn DbSession,
) -> Result<()> {
    if let Some(key) = filter.base_resource_key() {
        context.base_snapshot = session
            .select_last_snapshot(key)
            .map_err(StorageError::into_query_execution)?;
        if context.base_snapshot.is_none() {
            warn!(base = %key, "base component of measure filter has no snapshot");
        }
    }
    Ok(())
}
