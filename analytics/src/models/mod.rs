//! Domain models for the retail analytics pipeline.
//!
//! - [`columns`] - Names of the columns the pipeline adds or produces
//! - [`CustomerMetrics`] - Typed view of one aggregated customer row

use serde::Serialize;

use crate::error::{TableResult, TransformError, TransformResult};
use crate::table::{DataType, Field, Schema, Table, Value};

// =============================================================================
// Column Names
// =============================================================================

/// Fixed names of derived and aggregated columns.
pub mod columns {
    pub const TOTAL_AMOUNT: &str = "TotalAmount";
    pub const YEAR: &str = "Year";
    pub const MONTH: &str = "Month";
    pub const DAY_OF_WEEK: &str = "DayOfWeek";
    pub const HOUR: &str = "Hour";

    pub const CUSTOMER_ID: &str = "CustomerID";
    pub const ORDER_COUNT: &str = "OrderCount";
    pub const TOTAL_SPEND: &str = "TotalSpend";
    pub const AVG_ORDER_VALUE: &str = "AvgOrderValue";
    pub const STD_ORDER_VALUE: &str = "StdOrderValue";
    pub const TOTAL_ITEMS_PURCHASED: &str = "TotalItemsPurchased";
    pub const UNIQUE_PRODUCTS: &str = "UniqueProducts";

    /// Calendar columns added when a timestamp column is present.
    pub const CALENDAR: [&str; 4] = [YEAR, MONTH, DAY_OF_WEEK, HOUR];

    /// Customer metrics columns, in output order.
    pub const METRICS: [&str; 7] = [
        CUSTOMER_ID,
        ORDER_COUNT,
        TOTAL_SPEND,
        AVG_ORDER_VALUE,
        STD_ORDER_VALUE,
        TOTAL_ITEMS_PURCHASED,
        UNIQUE_PRODUCTS,
    ];
}

// =============================================================================
// Customer Metrics
// =============================================================================

/// Aggregated statistics for one customer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CustomerMetrics {
    #[serde(rename = "CustomerID")]
    pub customer_id: Value,
    /// Distinct invoices.
    pub order_count: i64,
    /// Sum of `TotalAmount`.
    pub total_spend: f64,
    /// Mean order value; `None` when the customer has no amounts at all.
    pub avg_order_value: Option<f64>,
    /// Sample standard deviation; `None` below two observations.
    pub std_order_value: Option<f64>,
    /// Sum of quantities.
    pub total_items_purchased: i64,
    /// Distinct stock codes.
    pub unique_products: i64,
}

impl CustomerMetrics {
    /// Schema of the metrics table. `CustomerID` keeps the input column type.
    pub fn schema(customer_id_type: DataType) -> Schema {
        Schema::new(vec![
            Field::new(columns::CUSTOMER_ID, customer_id_type),
            Field::new(columns::ORDER_COUNT, DataType::Int),
            Field::new(columns::TOTAL_SPEND, DataType::Float),
            Field::new(columns::AVG_ORDER_VALUE, DataType::Float),
            Field::new(columns::STD_ORDER_VALUE, DataType::Float),
            Field::new(columns::TOTAL_ITEMS_PURCHASED, DataType::Int),
            Field::new(columns::UNIQUE_PRODUCTS, DataType::Int),
        ])
        .unwrap_or_default()
    }

    pub fn to_row(&self) -> Vec<Value> {
        vec![
            self.customer_id.clone(),
            Value::Int(self.order_count),
            Value::Float(self.total_spend),
            self.avg_order_value.into(),
            self.std_order_value.into(),
            Value::Int(self.total_items_purchased),
            Value::Int(self.unique_products),
        ]
    }

    /// Read one row of a metrics table, `None` if a cell has the wrong shape.
    pub fn from_row(row: &[Value]) -> Option<Self> {
        match row {
            [customer_id, order_count, total_spend, avg, std, items, products] => Some(Self {
                customer_id: customer_id.clone(),
                order_count: order_count.as_i64()?,
                total_spend: total_spend.as_f64()?,
                avg_order_value: avg.as_f64(),
                std_order_value: std.as_f64(),
                total_items_purchased: items.as_i64()?,
                unique_products: products.as_i64()?,
            }),
            _ => None,
        }
    }

    /// Build a metrics table from typed records.
    pub fn to_table(records: &[CustomerMetrics], customer_id_type: DataType) -> TableResult<Table> {
        Table::new(
            Self::schema(customer_id_type),
            records.iter().map(Self::to_row).collect(),
        )
    }

    /// Typed records from a metrics table.
    pub fn from_table(table: &Table) -> TransformResult<Vec<CustomerMetrics>> {
        let names = table.schema().names();
        if names != columns::METRICS {
            let missing = columns::METRICS
                .iter()
                .find(|c| !names.contains(c))
                .unwrap_or(&columns::CUSTOMER_ID);
            return Err(TransformError::MissingColumn(missing.to_string()));
        }
        table
            .rows()
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                Self::from_row(row).ok_or_else(|| {
                    TransformError::MissingColumn(format!("metrics row {} is incomplete", idx))
                })
            })
            .collect()
    }
}
