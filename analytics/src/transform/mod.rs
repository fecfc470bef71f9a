//! Transformation stages.
//!
//! - Cleaner: duplicate and invalid row removal
//! - Features: monetary and calendar columns
//! - Aggregate: per-customer rollup
//! - Pipeline: the three stages wired together with named artifacts

pub mod aggregate;
pub mod cleaner;
pub mod features;
pub mod pipeline;

pub use aggregate::{aggregate_customer_metrics, customer_metrics};
pub use cleaner::{clean_transactions, clean_transactions_with_report, CleaningReport};
pub use features::{add_derived_features, parse_timestamp};
pub use pipeline::*;

use crate::error::{TransformError, TransformResult};
use crate::table::{DataType, Table};

/// Index of a column the stage cannot run without.
///
/// `accepted` lists the allowed types; empty means any type.
pub(crate) fn require_column(table: &Table, name: &str, accepted: &[DataType]) -> TransformResult<usize> {
    let idx = table
        .schema()
        .index_of(name)
        .ok_or_else(|| TransformError::MissingColumn(name.to_string()))?;

    let found = table.schema().fields()[idx].dtype;
    match accepted.first() {
        Some(&expected) if !accepted.contains(&found) => Err(TransformError::ColumnType {
            column: name.to_string(),
            expected,
            found,
        }),
        _ => Ok(idx),
    }
}
