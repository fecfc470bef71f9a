//! High-level pipeline API: raw transactions to customer metrics.
//!
//! Runs the three stages in order, each reading the artifact the previous
//! one produced:
//!
//! | Stage                     | Input                        | Output                       |
//! |---------------------------|------------------------------|------------------------------|
//! | `clean_transactions_node` | `raw_transactions`           | `cleaned_transactions`       |
//! | `add_features_node`       | `cleaned_transactions`       | `transactions_with_features` |
//! | `aggregate_metrics_node`  | `transactions_with_features` | `customer_metrics`           |
//!
//! # Example
//!
//! ```rust,ignore
//! use retail_analytics::{run_csv, PipelineOptions};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let output = run_csv(Path::new("online_retail.csv"), &PipelineOptions::default())?;
//!     println!("{} customers", output.metrics.row_count());
//!     Ok(())
//! }
//! ```

use serde::Serialize;
use std::fmt;
use std::path::Path;

use super::aggregate::aggregate_customer_metrics;
use super::cleaner::{clean_transactions, clean_transactions_with_report, CleaningReport};
use super::features::add_derived_features;
use crate::checkpoint::CheckpointStore;
use crate::config::PipelineOptions;
use crate::error::{PipelineResult, ValidationError};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::parser::{format_delimiter, parse_csv_file_auto};
use crate::table::Table;
use crate::validation::{validate_cleaned, validate_enriched, validate_metrics};

pub const RAW_TRANSACTIONS: &str = "raw_transactions";
pub const CLEANED_TRANSACTIONS: &str = "cleaned_transactions";
pub const TRANSACTIONS_WITH_FEATURES: &str = "transactions_with_features";
pub const CUSTOMER_METRICS: &str = "customer_metrics";

/// One step of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Clean,
    AddFeatures,
    AggregateMetrics,
}

impl Stage {
    /// Stages in execution order.
    pub const ALL: [Stage; 3] = [Stage::Clean, Stage::AddFeatures, Stage::AggregateMetrics];

    pub fn node_name(&self) -> &'static str {
        match self {
            Stage::Clean => "clean_transactions_node",
            Stage::AddFeatures => "add_features_node",
            Stage::AggregateMetrics => "aggregate_metrics_node",
        }
    }

    /// Name of the artifact this stage reads.
    pub fn input(&self) -> &'static str {
        match self {
            Stage::Clean => RAW_TRANSACTIONS,
            Stage::AddFeatures => CLEANED_TRANSACTIONS,
            Stage::AggregateMetrics => TRANSACTIONS_WITH_FEATURES,
        }
    }

    /// Name of the artifact this stage produces.
    pub fn output(&self) -> &'static str {
        match self {
            Stage::Clean => CLEANED_TRANSACTIONS,
            Stage::AddFeatures => TRANSACTIONS_WITH_FEATURES,
            Stage::AggregateMetrics => CUSTOMER_METRICS,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_name())
    }
}

/// Every artifact produced by a full run
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub cleaned: Table,
    pub enriched: Table,
    pub metrics: Table,
    /// Rows removed by each cleaning rule
    pub cleaning: CleaningReport,
}

/// Load a CSV file and run the full pipeline on it.
pub fn run_csv(path: &Path, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    log_info(format!("📖 Reading {}...", path.display()));
    let parsed = parse_csv_file_auto(path, &options.columns)?;
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Detected separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!(
        "Read {} rows, {} columns",
        parsed.table.row_count(),
        parsed.headers.len()
    ));

    run_pipeline(&parsed.table, options)
}

/// Run the full pipeline, checkpointing to `options.checkpoint_dir` if set.
pub fn run_pipeline(raw: &Table, options: &PipelineOptions) -> PipelineResult<PipelineOutput> {
    let mut store = match &options.checkpoint_dir {
        Some(dir) => Some(CheckpointStore::open(dir)?),
        None => None,
    };
    run_pipeline_with_store(raw, options, store.as_mut())
}

/// Run the full pipeline with an explicit checkpoint store.
pub fn run_pipeline_with_store(
    raw: &Table,
    options: &PipelineOptions,
    mut store: Option<&mut CheckpointStore>,
) -> PipelineResult<PipelineOutput> {
    log_stage_start(Stage::Clean);
    let (cleaned, cleaning) = clean_transactions_with_report(raw, &options.columns)?;
    log_cleaning_report(&cleaning);
    validate_stage(Stage::Clean, raw, &cleaned, options)?;
    checkpoint(&mut store, Stage::Clean.output(), &cleaned)?;

    log_stage_start(Stage::AddFeatures);
    let enriched = run_stage(Stage::AddFeatures, &cleaned, options)?;
    log_success(format!(
        "Added {} column(s)",
        enriched.schema().len() - cleaned.schema().len()
    ));
    validate_stage(Stage::AddFeatures, &cleaned, &enriched, options)?;
    checkpoint(&mut store, Stage::AddFeatures.output(), &enriched)?;

    log_stage_start(Stage::AggregateMetrics);
    let metrics = run_stage(Stage::AggregateMetrics, &enriched, options)?;
    log_success(format!("{} customers", metrics.row_count()));
    validate_stage(Stage::AggregateMetrics, &enriched, &metrics, options)?;
    checkpoint(&mut store, Stage::AggregateMetrics.output(), &metrics)?;

    Ok(PipelineOutput {
        cleaned,
        enriched,
        metrics,
        cleaning,
    })
}

/// Run a single stage on its input artifact.
pub fn run_stage(stage: Stage, input: &Table, options: &PipelineOptions) -> PipelineResult<Table> {
    let output = match stage {
        Stage::Clean => clean_transactions(input, &options.columns)?,
        Stage::AddFeatures => add_derived_features(input, options)?,
        Stage::AggregateMetrics => {
            aggregate_customer_metrics(input, &options.columns, options.order_value_grain)?
        }
    };
    Ok(output)
}

/// Check a stage's output invariants, unless validation is disabled.
pub fn validate_stage(
    stage: Stage,
    input: &Table,
    output: &Table,
    options: &PipelineOptions,
) -> PipelineResult<()> {
    if options.skip_validation {
        return Ok(());
    }

    let result = match stage {
        Stage::Clean => validate_cleaned(output, &options.columns),
        Stage::AddFeatures => validate_enriched(input, output),
        Stage::AggregateMetrics => validate_metrics(output),
    };

    result.map_err(|errors| {
        for err in errors.iter().take(3) {
            log_error(format!("{}: {}", stage.output(), err));
        }
        ValidationError::Violations {
            artifact: stage.output().to_string(),
            errors,
        }
        .into()
    })
}

fn checkpoint(store: &mut Option<&mut CheckpointStore>, name: &str, table: &Table) -> PipelineResult<()> {
    if let Some(store) = store {
        let entry = store.save(name, table)?;
        log_info_indent(format!("💾 Saved {} ({} rows)", entry.file, entry.row_count), 1);
    }
    Ok(())
}

fn log_stage_start(stage: Stage) {
    log_info(format!("⚙️  {}: {} → {}", stage, stage.input(), stage.output()));
}

fn log_cleaning_report(report: &CleaningReport) {
    log_success(format!("Kept {} of {} rows", report.output_rows, report.input_rows));
    if report.dropped() == 0 {
        return;
    }
    for (count, reason) in [
        (report.duplicate_rows, "duplicate"),
        (report.missing_required, "missing required field"),
        (report.non_positive_quantity, "non-positive quantity"),
        (report.non_positive_price, "non-positive or missing price"),
    ] {
        if count > 0 {
            log_info_indent(format!("{} {}", count, reason), 1);
        }
    }
    if report.output_rows == 0 {
        log_warning("No rows survived cleaning");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OrderValueGrain;
    use crate::error::PipelineError;
    use crate::models::{columns, CustomerMetrics};
    use crate::table::Value;
    use crate::transform::fixtures::{row, scenario, table};
    use tempfile::tempdir;

    #[test]
    fn test_worked_scenario() {
        let output = run_pipeline(&scenario(), &PipelineOptions::default()).unwrap();

        assert_eq!(output.cleaned.row_count(), 2);
        assert_eq!(output.enriched.value(0, "TotalAmount"), Some(&Value::Float(20.0)));
        assert_eq!(output.enriched.value(1, "TotalAmount"), Some(&Value::Float(5.0)));

        let metrics = CustomerMetrics::from_table(&output.metrics).unwrap();
        assert_eq!(metrics.len(), 1);
        let a = &metrics[0];
        assert_eq!(a.customer_id, Value::from("A"));
        assert_eq!(a.order_count, 1);
        assert_eq!(a.total_spend, 25.0);
        assert_eq!(a.total_items_purchased, 3);
        assert!(a.unique_products <= 2);
        assert_eq!(a.avg_order_value, Some(12.5));
        let std = a.std_order_value.unwrap();
        assert!((std - 112.5f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_invoice_grain() {
        let options = PipelineOptions {
            order_value_grain: OrderValueGrain::Invoice,
            ..PipelineOptions::default()
        };
        let output = run_pipeline(&scenario(), &options).unwrap();
        let a = &CustomerMetrics::from_table(&output.metrics).unwrap()[0];
        assert_eq!(a.avg_order_value, Some(25.0));
        assert_eq!(a.std_order_value, None);
    }

    #[test]
    fn test_duplicate_row_collapses() {
        let dup = row(Some("1"), Some("P1"), Some(2), Some(10.0), Some("A"));
        let output = run_pipeline(&table(vec![dup.clone(), dup]), &PipelineOptions::default()).unwrap();

        assert_eq!(output.cleaned.row_count(), 1);
        assert_eq!(output.cleaning.duplicate_rows, 1);
        let a = &CustomerMetrics::from_table(&output.metrics).unwrap()[0];
        assert_eq!(a.total_spend, 20.0);
        assert_eq!(a.std_order_value, None);
    }

    #[test]
    fn test_empty_input() {
        let output = run_pipeline(&table(vec![]), &PipelineOptions::default()).unwrap();

        assert!(output.cleaned.is_empty());
        assert!(output.enriched.is_empty());
        assert!(output.metrics.is_empty());
        assert!(output.enriched.schema().contains(columns::TOTAL_AMOUNT));
        assert_eq!(output.metrics.schema().names(), columns::METRICS);
    }

    #[test]
    fn test_stage_artifacts_chain() {
        for pair in Stage::ALL.windows(2) {
            assert_eq!(pair[0].output(), pair[1].input());
        }
        assert_eq!(Stage::Clean.input(), RAW_TRANSACTIONS);
        assert_eq!(Stage::AggregateMetrics.to_string(), "aggregate_metrics_node");
    }

    #[test]
    fn test_validation_failure_surfaces() {
        let raw = scenario();
        let err = validate_stage(Stage::Clean, &raw, &raw, &PipelineOptions::default()).unwrap_err();
        match err {
            PipelineError::Validation(ValidationError::Violations { artifact, errors }) => {
                assert_eq!(artifact, CLEANED_TRANSACTIONS);
                assert_eq!(errors.len(), 1);
            }
            other => panic!("unexpected error: {}", other),
        }

        let options = PipelineOptions {
            skip_validation: true,
            ..PipelineOptions::default()
        };
        assert!(validate_stage(Stage::Clean, &raw, &raw, &options).is_ok());
    }

    #[test]
    fn test_checkpoints_written() {
        let dir = tempdir().unwrap();
        let options = PipelineOptions {
            checkpoint_dir: Some(dir.path().to_path_buf()),
            ..PipelineOptions::default()
        };
        let output = run_pipeline(&scenario(), &options).unwrap();

        let store = CheckpointStore::open(dir.path()).unwrap();
        let names: Vec<&str> = store.list().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![CLEANED_TRANSACTIONS, CUSTOMER_METRICS, TRANSACTIONS_WITH_FEATURES]);
        assert_eq!(store.load(CLEANED_TRANSACTIONS).unwrap(), output.cleaned);
        assert_eq!(store.load(TRANSACTIONS_WITH_FEATURES).unwrap(), output.enriched);
        assert_eq!(store.load(CUSTOMER_METRICS).unwrap(), output.metrics);
    }

    #[test]
    fn test_run_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("retail.csv");
        std::fs::write(
            &path,
            "InvoiceNo;StockCode;Description;Quantity;InvoiceDate;UnitPrice;CustomerID;Country\n\
             536365;85123A;WHITE HANGING HEART;6;2010-12-01 08:26:00;2.55;17850.0;United Kingdom\n\
             536365;71053;WHITE METAL LANTERN;6;2010-12-01 08:26:00;3.39;17850.0;United Kingdom\n\
             C536379;D;Discount;-1;2010-12-01 09:41:00;27.5;14527.0;United Kingdom\n\
             536414;22139;;56;2010-12-01 11:52:00;0;;United Kingdom\n",
        )
        .unwrap();

        let output = run_csv(&path, &PipelineOptions::default()).unwrap();
        assert_eq!(output.cleaned.row_count(), 2);
        assert_eq!(output.enriched.value(0, "DayOfWeek"), Some(&Value::Int(2)));
        assert_eq!(output.enriched.value(1, "Hour"), Some(&Value::Int(8)));

        let metrics = CustomerMetrics::from_table(&output.metrics).unwrap();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].customer_id, Value::from("17850"));
        assert_eq!(metrics[0].total_items_purchased, 12);
        assert_eq!(metrics[0].unique_products, 2);
    }
}
