//! Invariant checks for stage outputs.
//!
//! Each check returns every violation it finds rather than stopping at the
//! first, so a report can show the full picture.
//!
//! - [`validate_cleaned`]: no duplicate rows, required fields present,
//!   quantity and unit price strictly positive
//! - [`validate_enriched`]: same rows, original columns unchanged
//! - [`validate_metrics`]: fixed column order, one row per customer id
//!
//! ```rust,ignore
//! use retail_analytics::{validate_cleaned, ColumnNames};
//!
//! match validate_cleaned(&cleaned, &ColumnNames::default()) {
//!     Ok(()) => println!("clean"),
//!     Err(errors) => println!("{} violations", errors.len()),
//! }
//! ```

use std::collections::HashSet;

use crate::config::ColumnNames;
use crate::models::columns;
use crate::table::{Table, Value};

/// Maximum number of violations reported per check.
const MAX_ERRORS: usize = 20;

/// Check the cleaner's output guarantees.
pub fn validate_cleaned(table: &Table, names: &ColumnNames) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    let lookup = |name: &str, errors: &mut Vec<String>| {
        let idx = table.schema().index_of(name);
        if idx.is_none() {
            errors.push(format!("missing column {}", name));
        }
        idx
    };
    let invoice = lookup(&names.invoice, &mut errors);
    let stock = lookup(&names.stock_code, &mut errors);
    let quantity = lookup(&names.quantity, &mut errors);
    let price = lookup(&names.unit_price, &mut errors);

    let (Some(invoice), Some(stock), Some(quantity), Some(price)) = (invoice, stock, quantity, price) else {
        return Err(errors);
    };

    let mut seen: HashSet<&[Value]> = HashSet::new();
    for (i, row) in table.rows().iter().enumerate() {
        if !seen.insert(row.as_slice()) {
            errors.push(format!("row {}: duplicate row", i));
        }
        for (idx, name) in [(invoice, &names.invoice), (stock, &names.stock_code), (quantity, &names.quantity)] {
            if row[idx].is_null() {
                errors.push(format!("row {}: {} is null", i, name));
            }
        }
        if !row[quantity].is_null() && !row[quantity].as_f64().is_some_and(|q| q > 0.0) {
            errors.push(format!("row {}: {} is not positive", i, names.quantity));
        }
        if !row[price].as_f64().is_some_and(|p| p > 0.0) {
            errors.push(format!("row {}: {} is not positive", i, names.unit_price));
        }
        if errors.len() >= MAX_ERRORS {
            break;
        }
    }

    finish(errors)
}

/// Check that enrichment only appended columns.
pub fn validate_enriched(input: &Table, enriched: &Table) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if input.row_count() != enriched.row_count() {
        errors.push(format!(
            "row count changed from {} to {}",
            input.row_count(),
            enriched.row_count()
        ));
    }

    let width = input.schema().len();
    if enriched.schema().len() < width || enriched.schema().fields()[..width] != *input.schema().fields() {
        errors.push("original columns were changed or reordered".to_string());
        return Err(errors);
    }
    if !enriched.schema().contains(columns::TOTAL_AMOUNT) {
        errors.push(format!("missing column {}", columns::TOTAL_AMOUNT));
    }

    for (i, (before, after)) in input.rows().iter().zip(enriched.rows()).enumerate() {
        if after[..width] != before[..] {
            errors.push(format!("row {}: original values changed", i));
            if errors.len() >= MAX_ERRORS {
                break;
            }
        }
    }

    finish(errors)
}

/// Check the customer metrics table.
pub fn validate_metrics(table: &Table) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    let names = table.schema().names();
    if names != columns::METRICS {
        errors.push(format!(
            "columns are [{}], expected [{}]",
            names.join(", "),
            columns::METRICS.join(", ")
        ));
        return Err(errors);
    }

    let mut seen: HashSet<&Value> = HashSet::new();
    for (i, row) in table.rows().iter().enumerate() {
        let id = &row[0];
        if id.is_null() {
            errors.push(format!("row {}: {} is null", i, columns::CUSTOMER_ID));
        } else if !seen.insert(id) {
            errors.push(format!("row {}: duplicate {} {}", i, columns::CUSTOMER_ID, id));
        }
        if errors.len() >= MAX_ERRORS {
            break;
        }
    }

    finish(errors)
}

/// Returns true if the cleaned table satisfies every invariant.
pub fn is_valid_cleaned(table: &Table, names: &ColumnNames) -> bool {
    validate_cleaned(table, names).is_ok()
}

fn finish(errors: Vec<String>) -> Result<(), Vec<String>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
