//! # Retail Analytics - Online retail transactions to customer metrics
//!
//! Cleans a raw table of retail line items, enriches it with monetary and
//! calendar columns, and rolls it up into one metrics row per customer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Raw table  │────▶│   Cleaner   │────▶│  Features   │────▶│  Aggregate  │
//! │ (CSV/auto)  │     │ (dedup/rows)│     │ (amount/cal)│     │ (customers) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use retail_analytics::{run_csv, PipelineOptions};
//!
//! fn main() {
//!     let output = run_csv("online_retail.csv".as_ref(), &PipelineOptions::default()).unwrap();
//!     println!("{} customers", output.metrics.row_count());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`table`] - Typed in-memory table
//! - [`config`] - Pipeline options (JSON file, environment)
//! - [`logs`] - Progress log broadcasting and tracing setup
//! - [`models`] - Column names and customer metrics records
//! - [`parser`] - CSV loading with auto-detection, CSV/JSON writers
//! - [`transform`] - Cleaner, features, aggregation and pipeline
//! - [`validation`] - Stage output invariant checks
//! - [`checkpoint`] - On-disk artifact store

// Core modules
pub mod error;
pub mod table;
pub mod config;
pub mod logs;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Checkpoints
pub mod checkpoint;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CheckpointError,
    ConfigError,
    CsvError,
    PipelineError,
    TableError,
    TransformError,
    ValidationError,
};

// =============================================================================
// Re-exports - Table
// =============================================================================

pub use table::{DataType, Field, Schema, Table, Value};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::{ColumnNames, OrderValueGrain, PipelineOptions};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::CustomerMetrics;

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    format_delimiter,
    parse_bytes_auto,
    parse_csv_file_auto,
    parse_str,
    parse_with_schema,
    table_to_json,
    write_csv,
    write_with_schema,
    ParseResult,
};

// =============================================================================
// Re-exports - Stages
// =============================================================================

pub use transform::{
    add_derived_features,
    aggregate_customer_metrics,
    clean_transactions,
    clean_transactions_with_report,
    customer_metrics,
    CleaningReport,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid_cleaned, validate_cleaned, validate_enriched, validate_metrics};

// =============================================================================
// Re-exports - Checkpoints
// =============================================================================

pub use checkpoint::{CheckpointStore, StoredCheckpoint};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    run_csv,
    run_pipeline,
    run_pipeline_with_store,
    run_stage,
    validate_stage,
    PipelineOutput,
    Stage,
};
