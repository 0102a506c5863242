//! Measure filters
//!
//! A [`MeasureFilter`] is built (usually by the [`MeasureFilterFactory`]),
//! validated against its resolved [`MeasureFilterContext`], compiled to
//! [`MeasureFilterSql`] and run by the [`MeasureFilterExecutor`].

pub mod executor;
pub mod factory;
pub mod filter;
pub mod sql;

pub use executor::MeasureFilterExecutor;
pub use factory::MeasureFilterFactory;
pub use filter::{
    is_valid, MeasureFilter, MeasureFilterCondition, MeasureFilterContext, MeasureFilterSort,
    Operator, SortField,
};
pub use sql::{MeasureFilterSql, SqlParam};
