//! Roll enriched transactions up into one metrics row per customer.
//!
//! ```text
//! Enriched rows                              →  Customer metrics
//! ┌──────────────────────────────────────┐      ┌─────────────────────────────┐
//! │ A, inv 1, P1, qty 2, TotalAmount 20  │      │ A: 1 order, spend 25,       │
//! │ A, inv 1, P2, qty 1, TotalAmount 5   │  →   │    3 items, 2 products      │
//! │ B, inv 2, P3, qty 4, TotalAmount 12  │      ├─────────────────────────────┤
//! └──────────────────────────────────────┘      │ B: 1 order, spend 12, ...   │
//!                                               └─────────────────────────────┘
//! ```
//!
//! `AvgOrderValue` and `StdOrderValue` are taken over line items by default,
//! so they describe the average line rather than the average invoice.
//! [`OrderValueGrain::Invoice`] switches both to per-invoice subtotals.
//!
//! Rows without a customer id cannot be attributed and are left out. Nulls
//! in the other columns are skipped by the sums and distinct counts.

use std::collections::{BTreeMap, HashMap, HashSet};

use super::require_column;
use crate::config::{ColumnNames, OrderValueGrain};
use crate::error::{TransformError, TransformResult};
use crate::logs::log_warning;
use crate::models::{columns, CustomerMetrics};
use crate::table::{DataType, Table, Value};

/// Aggregate an enriched table into the customer metrics table.
pub fn aggregate_customer_metrics(
    table: &Table,
    names: &ColumnNames,
    grain: OrderValueGrain,
) -> TransformResult<Table> {
    let records = customer_metrics(table, names, grain)?;
    let customer_type = table
        .schema()
        .field(&names.customer_id)
        .map(|f| f.dtype)
        .unwrap_or(DataType::Str);

    Ok(CustomerMetrics::to_table(&records, customer_type)?)
}

/// Typed customer metrics, sorted by customer id.
pub fn customer_metrics(
    table: &Table,
    names: &ColumnNames,
    grain: OrderValueGrain,
) -> TransformResult<Vec<CustomerMetrics>> {
    let customer = require_column(table, &names.customer_id, &[])?;
    let invoice = require_column(table, &names.invoice, &[])?;
    let amount = require_column(table, columns::TOTAL_AMOUNT, &[DataType::Float, DataType::Int])?;
    let quantity = require_column(table, &names.quantity, &[DataType::Int])?;
    let stock = require_column(table, &names.stock_code, &[])?;

    let mut customers: BTreeMap<&Value, CustomerAccumulator> = BTreeMap::new();
    let mut unattributed = 0usize;

    for row in table.rows() {
        if row[customer].is_null() {
            unattributed += 1;
            continue;
        }
        customers
            .entry(&row[customer])
            .or_default()
            .add(&row[invoice], &row[stock], &row[quantity], &row[amount])
            .ok_or_else(|| TransformError::Overflow {
                column: names.quantity.clone(),
            })?;
    }

    if unattributed > 0 {
        log_warning(format!(
            "{} rows without {} left out of customer metrics",
            unattributed, names.customer_id
        ));
    }

    Ok(customers
        .into_iter()
        .map(|(id, acc)| acc.build(id.clone(), grain))
        .collect())
}

/// Running totals for one customer.
#[derive(Default)]
struct CustomerAccumulator<'a> {
    invoices: HashSet<&'a Value>,
    stock_codes: HashSet<&'a Value>,
    line_amounts: Vec<f64>,
    invoice_totals: Vec<f64>,
    invoice_slots: HashMap<&'a Value, usize>,
    items: i64,
}

impl<'a> CustomerAccumulator<'a> {
    /// `None` when the item count overflows.
    fn add(
        &mut self,
        invoice: &'a Value,
        stock: &'a Value,
        quantity: &'a Value,
        amount: &'a Value,
    ) -> Option<()> {
        if !invoice.is_null() {
            self.invoices.insert(invoice);
        }
        if !stock.is_null() {
            self.stock_codes.insert(stock);
        }
        if let Some(q) = quantity.as_i64() {
            self.items = self.items.checked_add(q)?;
        }
        if let Some(a) = amount.as_f64() {
            self.line_amounts.push(a);
            if !invoice.is_null() {
                let next = self.invoice_totals.len();
                let slot = *self.invoice_slots.entry(invoice).or_insert(next);
                if slot == next {
                    self.invoice_totals.push(0.0);
                }
                self.invoice_totals[slot] += a;
            }
        }
        Some(())
    }

    fn build(self, customer_id: Value, grain: OrderValueGrain) -> CustomerMetrics {
        let observations = match grain {
            OrderValueGrain::Row => &self.line_amounts,
            OrderValueGrain::Invoice => &self.invoice_totals,
        };

        CustomerMetrics {
            customer_id,
            order_count: self.invoices.len() as i64,
            total_spend: self.line_amounts.iter().sum(),
            avg_order_value: mean(observations),
            std_order_value: sample_std(observations),
            total_items_purchased: self.items,
            unique_products: self.stock_codes.len() as i64,
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Unbiased (n - 1) standard deviation, undefined below two values.
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}
