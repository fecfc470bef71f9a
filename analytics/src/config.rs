//! Pipeline options.
//!
//! Options are layered: built-in defaults, then an optional JSON file, then
//! environment variables (a `.env` file is honoured by the CLI through
//! `dotenvy`), then command-line flags.
//!
//! ```json
//! {
//!   "columns": { "invoice": "Invoice", "customerId": "Customer ID" },
//!   "orderValueGrain": "invoice",
//!   "checkpointDir": "out/checkpoints"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};

/// Overrides [`PipelineOptions::order_value_grain`] (`row` or `invoice`).
pub const ENV_ORDER_VALUE_GRAIN: &str = "RETAIL_ORDER_VALUE_GRAIN";

/// Overrides [`PipelineOptions::checkpoint_dir`].
pub const ENV_CHECKPOINT_DIR: &str = "RETAIL_CHECKPOINT_DIR";

/// chrono formats tried, in order, after RFC 3339.
pub const DEFAULT_TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d",
];

/// Names of the input columns the stages read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnNames {
    pub invoice: String,
    pub stock_code: String,
    pub quantity: String,
    pub unit_price: String,
    pub customer_id: String,
    pub timestamp: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            invoice: "InvoiceNo".to_string(),
            stock_code: "StockCode".to_string(),
            quantity: "Quantity".to_string(),
            unit_price: "UnitPrice".to_string(),
            customer_id: "CustomerID".to_string(),
            timestamp: "InvoiceDate".to_string(),
        }
    }
}

/// Observations over which `AvgOrderValue` and `StdOrderValue` are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderValueGrain {
    /// One observation per line item (each row's `TotalAmount`).
    #[default]
    Row,
    /// One observation per invoice (sum of its rows' `TotalAmount`).
    Invoice,
}

impl FromStr for OrderValueGrain {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "row" | "line" | "line-item" => Ok(Self::Row),
            "invoice" | "order" => Ok(Self::Invoice),
            _ => Err(ConfigError::InvalidValue {
                key: "order value grain".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Options for the transformation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Input column names
    pub columns: ColumnNames,

    /// Accepted timestamp formats (chrono syntax)
    pub timestamp_formats: Vec<String>,

    /// Aggregation grain for order value statistics
    pub order_value_grain: OrderValueGrain,

    /// Persist intermediate artifacts to this directory
    pub checkpoint_dir: Option<PathBuf>,

    /// Skip invariant checks on stage outputs
    pub skip_validation: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            timestamp_formats: DEFAULT_TIMESTAMP_FORMATS.iter().map(|f| f.to_string()).collect(),
            order_value_grain: OrderValueGrain::Row,
            checkpoint_dir: None,
            skip_validation: false,
        }
    }
}

impl PipelineOptions {
    /// Parse options from JSON. Missing keys keep their defaults.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Apply `RETAIL_*` environment overrides.
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(grain) = lookup(ENV_ORDER_VALUE_GRAIN) {
            self.order_value_grain = grain.parse()?;
        }
        if let Some(dir) = lookup(ENV_CHECKPOINT_DIR).filter(|d| !d.trim().is_empty()) {
            self.checkpoint_dir = Some(PathBuf::from(dir));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_options() {
        let opts = PipelineOptions::default();
        assert_eq!(opts.columns.invoice, "InvoiceNo");
        assert_eq!(opts.columns.customer_id, "CustomerID");
        assert_eq!(opts.order_value_grain, OrderValueGrain::Row);
        assert!(opts.checkpoint_dir.is_none());
        assert!(!opts.skip_validation);
        assert_eq!(opts.timestamp_formats.len(), DEFAULT_TIMESTAMP_FORMATS.len());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let opts = PipelineOptions::from_json(
            r#"{ "columns": { "customerId": "Customer ID" }, "orderValueGrain": "invoice" }"#,
        )
        .unwrap();
        assert_eq!(opts.columns.customer_id, "Customer ID");
        assert_eq!(opts.columns.invoice, "InvoiceNo");
        assert_eq!(opts.order_value_grain, OrderValueGrain::Invoice);
    }

    #[test]
    fn test_invalid_json_rejected() {
        let err = PipelineOptions::from_json(r#"{ "orderValueGrain": "weekly" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_ORDER_VALUE_GRAIN, "Invoice"),
            (ENV_CHECKPOINT_DIR, "/tmp/checkpoints"),
        ]
        .into_iter()
        .collect();

        let opts = PipelineOptions::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(opts.order_value_grain, OrderValueGrain::Invoice);
        assert_eq!(opts.checkpoint_dir, Some(PathBuf::from("/tmp/checkpoints")));
    }

    #[test]
    fn test_bad_grain_override() {
        let err = PipelineOptions::default()
            .with_overrides(|k| (k == ENV_ORDER_VALUE_GRAIN).then(|| "weekly".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("weekly"));
    }
}
