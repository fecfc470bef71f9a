//! Error types for the retail analytics pipeline.
//!
//! - [`TableError`] - Table construction and column errors
//! - [`CsvError`] - CSV loading errors with line/column context
//! - [`TransformError`] - Stage errors (schema violations, bad timestamps)
//! - [`ConfigError`] - Options file and environment errors
//! - [`CheckpointError`] - Checkpoint store errors
//! - [`ValidationError`] - Invariant violations found on a stage output
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Conversion into [`PipelineError`] is automatic via `From`
//! implementations, so `?` works across layers.

use thiserror::Error;

use crate::table::DataType;

// =============================================================================
// Table Errors
// =============================================================================

/// Errors raised while building or extending a [`crate::table::Table`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// Two fields share a name.
    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    /// Lookup of a column that is not in the schema.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// A row does not have one cell per field.
    #[error("Row {row} has {found} cells, schema has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A cell does not match its column type.
    #[error("Row {row}, column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        row: usize,
        column: String,
        expected: DataType,
        found: DataType,
    },

    /// A new column does not have one value per row.
    #[error("Column '{column}' has {found} values, table has {expected} rows")]
    ColumnLength {
        column: String,
        expected: usize,
        found: usize,
    },
}

// =============================================================================
// CSV Errors
// =============================================================================

/// CSV loading error with context.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvError {
    pub line: usize,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => write!(f, "Line {}, column '{}': {}", self.line, col, self.message),
            _ => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line() as usize).unwrap_or(0);
        CsvError::new(line, err.to_string())
    }
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors raised by the cleaning, enrichment and aggregation stages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    /// A column the stage needs is absent from the input schema.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A required column exists but has the wrong type.
    #[error("Column '{column}' must be {expected}, found {found}")]
    ColumnType {
        column: String,
        expected: DataType,
        found: DataType,
    },

    /// A running total left the range of its type.
    #[error("Column '{column}' total overflows")]
    Overflow { column: String },

    /// A timestamp cell could not be parsed with any accepted format.
    #[error("Row {row}, column '{column}': cannot parse timestamp '{value}'")]
    TimestampParse {
        row: usize,
        column: String,
        value: String,
    },

    /// Building the output table failed.
    #[error(transparent)]
    Table(#[from] TableError),
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while loading [`crate::config::PipelineOptions`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read options file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A setting has a value outside its domain.
    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

// =============================================================================
// Checkpoint Errors
// =============================================================================

/// Errors from the checkpoint store.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("Checkpoint not found: {0}")]
    NotFound(String),

    #[error("Checkpoint IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Checkpoint manifest error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Checkpoint data error: {0}")]
    Csv(#[from] CsvError),

    #[error("Checkpoint schema error: {0}")]
    Table(#[from] TableError),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Invariant violations detected on a stage output.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{artifact} failed validation with {} violation(s): {}", .errors.len(), .errors.join("; "))]
    Violations { artifact: String, errors: Vec<String> },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors, returned by [`crate::transform::pipeline::run_pipeline`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

pub type TableResult<T> = Result<T, TableError>;

pub type CsvResult<T> = Result<T, CsvError>;

pub type TransformResult<T> = Result<T, TransformError>;

pub type ConfigResult<T> = Result<T, ConfigError>;

pub type CheckpointResult<T> = Result<T, CheckpointError>;

pub type PipelineResult<T> = Result<T, PipelineError>;
