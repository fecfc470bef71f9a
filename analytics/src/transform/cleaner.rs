//! Remove duplicate and invalid transaction rows.
//!
//! Exact duplicates are dropped first, over the full row. The remaining
//! rules are independent row predicates, so the surviving set does not
//! depend on the order they are checked in:
//!
//! 1. invoice id, stock code and quantity are present
//! 2. quantity > 0 (drops cancellations)
//! 3. unit price > 0 (a missing price is not positive)
//!
//! Surviving rows keep their relative order and every input column.

use serde::Serialize;

use super::require_column;
use crate::config::ColumnNames;
use crate::error::TransformResult;
use crate::table::{DataType, Table, Value};

/// Rows removed by each cleaning rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleaningReport {
    pub input_rows: usize,
    pub duplicate_rows: usize,
    pub missing_required: usize,
    pub non_positive_quantity: usize,
    pub non_positive_price: usize,
    pub output_rows: usize,
}

impl CleaningReport {
    pub fn dropped(&self) -> usize {
        self.input_rows - self.output_rows
    }
}

/// Clean a raw transaction table.
pub fn clean_transactions(raw: &Table, names: &ColumnNames) -> TransformResult<Table> {
    clean_transactions_with_report(raw, names).map(|(table, _)| table)
}

/// Clean a raw transaction table and count what each rule removed.
pub fn clean_transactions_with_report(
    raw: &Table,
    names: &ColumnNames,
) -> TransformResult<(Table, CleaningReport)> {
    let invoice = require_column(raw, &names.invoice, &[])?;
    let stock = require_column(raw, &names.stock_code, &[])?;
    let quantity = require_column(raw, &names.quantity, &[DataType::Int])?;
    let price = require_column(raw, &names.unit_price, &[DataType::Float, DataType::Int])?;

    let mut report = CleaningReport {
        input_rows: raw.row_count(),
        ..CleaningReport::default()
    };

    let distinct = raw.distinct();
    report.duplicate_rows = raw.row_count() - distinct.row_count();

    let cleaned = distinct.filter(|row| {
        if row[invoice].is_null() || row[stock].is_null() || row[quantity].is_null() {
            report.missing_required += 1;
            false
        } else if !row[quantity].as_i64().is_some_and(|q| q > 0) {
            report.non_positive_quantity += 1;
            false
        } else if !is_positive(&row[price]) {
            report.non_positive_price += 1;
            false
        } else {
            true
        }
    });
    report.output_rows = cleaned.row_count();

    Ok((cleaned, report))
}

fn is_positive(value: &Value) -> bool {
    value.as_f64().is_some_and(|v| v > 0.0)
}
