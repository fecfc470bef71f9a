//! Derived monetary and calendar columns.
//!
//! Adds `TotalAmount = quantity × unit price` to every row. When the input
//! has a timestamp column it also adds `Year`, `Month` (1-12), `DayOfWeek`
//! (0 = Monday .. 6 = Sunday) and `Hour` (0-23); without one, those columns
//! are left out entirely.
//!
//! Timestamps are parsed strictly: one unparseable value fails the stage,
//! naming the row. A null timestamp gives null calendar fields.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};

use super::require_column;
use crate::config::PipelineOptions;
use crate::error::{TransformError, TransformResult};
use crate::models::columns;
use crate::table::{DataType, Field, Table, Value};

/// Add `TotalAmount` and, if a timestamp column exists, the calendar columns.
pub fn add_derived_features(table: &Table, options: &PipelineOptions) -> TransformResult<Table> {
    let names = &options.columns;
    let quantity = require_column(table, &names.quantity, &[DataType::Int, DataType::Float])?;
    let price = require_column(table, &names.unit_price, &[DataType::Float, DataType::Int])?;

    let totals: Vec<Value> = table
        .rows()
        .iter()
        .map(|row| match (row[quantity].as_f64(), row[price].as_f64()) {
            (Some(q), Some(p)) => Value::Float(q * p),
            _ => Value::Null,
        })
        .collect();
    let mut enriched = table.with_column(Field::new(columns::TOTAL_AMOUNT, DataType::Float), totals)?;

    if table.schema().contains(&names.timestamp) {
        let timestamps = parse_timestamp_column(table, &names.timestamp, &options.timestamp_formats)?;

        let calendar: [(&str, fn(&NaiveDateTime) -> i64); 4] = [
            (columns::YEAR, |dt| i64::from(dt.year())),
            (columns::MONTH, |dt| i64::from(dt.month())),
            (columns::DAY_OF_WEEK, |dt| i64::from(dt.weekday().num_days_from_monday())),
            (columns::HOUR, |dt| i64::from(dt.hour())),
        ];
        for (name, extract) in calendar {
            let values: Vec<Value> = timestamps
                .iter()
                .map(|ts| ts.as_ref().map(extract).into())
                .collect();
            enriched = enriched.with_column(Field::new(name, DataType::Int), values)?;
        }
    }

    Ok(enriched)
}

fn parse_timestamp_column(
    table: &Table,
    column: &str,
    formats: &[String],
) -> TransformResult<Vec<Option<NaiveDateTime>>> {
    let idx = require_column(table, column, &[DataType::Str, DataType::DateTime])?;

    table
        .rows()
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let cell = &row[idx];
            if cell.is_null() {
                return Ok(None);
            }
            if let Some(dt) = cell.as_datetime() {
                return Ok(Some(dt));
            }
            let raw = cell.to_string();
            parse_timestamp(&raw, formats)
                .map(Some)
                .ok_or_else(|| TransformError::TimestampParse {
                    row: row_idx,
                    column: column.to_string(),
                    value: raw,
                })
        })
        .collect()
}

/// Parse a timestamp as RFC 3339 (keeping its local wall-clock time), then
/// with each format in turn. Date-only formats give midnight.
pub fn parse_timestamp(raw: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }

    formats.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(raw, fmt).ok().or_else(|| {
            NaiveDate::parse_from_str(raw, fmt)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}
