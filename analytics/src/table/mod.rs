//! In-memory tabular data.
//!
//! A [`Table`] is a [`Schema`] plus a list of rows, each row holding exactly
//! one [`Value`] per field. Tables are never mutated by the pipeline: every
//! operation here returns a new table, so a stage output can be handed to a
//! checkpoint store or inspected while the next stage runs on it.
//!
//! ```text
//! Schema:  InvoiceNo(str) | StockCode(str) | Quantity(int) | UnitPrice(float)
//! Row 0:   "536365"       | "85123A"       | 6             | 2.55
//! Row 1:   "536365"       | "71053"        | 6             | 3.39
//! ```
//!
//! # Value equality
//!
//! Duplicate detection compares whole rows, so [`Value`] implements `Eq`,
//! `Hash` and `Ord`. Floats compare by canonical bit pattern: `-0.0` equals
//! `0.0` and every NaN equals every other NaN.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{TableError, TableResult};

/// Format used to render [`Value::DateTime`] cells as text.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Data Types
// =============================================================================

/// Logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Int,
    Float,
    Str,
    DateTime,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Str => "str",
            DataType::DateTime => "datetime",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Values
// =============================================================================

/// A single cell.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Type of the cell, `None` for nulls.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Int(_) => Some(DataType::Int),
            Value::Float(_) => Some(DataType::Float),
            Value::Str(_) => Some(DataType::Str),
            Value::DateTime(_) => Some(DataType::DateTime),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view of the cell; integers are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Str(_) => 2,
            Value::DateTime(_) => 3,
        }
    }
}

fn canonical_float(v: f64) -> f64 {
    if v.is_nan() {
        f64::NAN
    } else if v == 0.0 {
        0.0
    } else {
        v
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                canonical_float(*a).to_bits() == canonical_float(*b).to_bits()
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Int(v) => v.hash(state),
            Value::Float(v) => canonical_float(*v).to_bits().hash(state),
            Value::Str(s) => s.hash(state),
            Value::DateTime(dt) => dt.hash(state),
        }
    }
}

impl Ord for Value {
    /// Nulls first, then numbers, strings and timestamps. Integers and
    /// floats compare numerically; an integer sorts before an equal float.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => canonical_float(*a).total_cmp(&canonical_float(*b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64)
                .total_cmp(&canonical_float(*b))
                .then(Ordering::Less),
            (Value::Float(a), Value::Int(b)) => canonical_float(*a)
                .total_cmp(&(*b as f64))
                .then(Ordering::Greater),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Text form used by the CSV writer. Nulls render as an empty string and
/// floats keep a decimal point so they read back as floats.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{:?}", v),
            Value::Str(s) => f.write_str(s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Int(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Str(s) => serializer.serialize_str(s),
            Value::DateTime(dt) => {
                serializer.collect_str(&dt.format("%Y-%m-%dT%H:%M:%S"))
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// =============================================================================
// Schema
// =============================================================================

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub dtype: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            dtype,
        }
    }
}

/// Ordered list of uniquely named fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> TableResult<Self> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(TableError::DuplicateColumn(field.name.clone()));
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// New schema with `field` appended.
    pub fn with_field(&self, field: Field) -> TableResult<Self> {
        if self.contains(&field.name) {
            return Err(TableError::DuplicateColumn(field.name));
        }
        let mut fields = self.fields.clone();
        fields.push(field);
        Ok(Self { fields })
    }
}

// =============================================================================
// Table
// =============================================================================

/// An immutable table: a schema and rows of typed cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    schema: Schema,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Build a table, checking row widths and cell types against the schema.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> TableResult<Self> {
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != schema.len() {
                return Err(TableError::RowWidth {
                    row: row_idx,
                    expected: schema.len(),
                    found: row.len(),
                });
            }
            for (field, cell) in schema.fields().iter().zip(row) {
                check_cell(row_idx, field, cell)?;
            }
        }
        Ok(Self { schema, rows })
    }

    /// A table with the given schema and no rows.
    pub fn empty(schema: Schema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row` in the column called `column`.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.schema.index_of(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// All cells of one column, in row order.
    pub fn column(&self, name: &str) -> TableResult<Vec<&Value>> {
        let idx = self
            .schema
            .index_of(name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Rows for which `keep` returns true, in their original order.
    pub fn filter<F>(&self, mut keep: F) -> Table
    where
        F: FnMut(&[Value]) -> bool,
    {
        Table {
            schema: self.schema.clone(),
            rows: self.rows.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Drop rows equal to an earlier row, keeping first occurrences.
    pub fn distinct(&self) -> Table {
        let mut seen: HashSet<&[Value]> = HashSet::with_capacity(self.rows.len());
        let rows = self
            .rows
            .iter()
            .filter(|r| seen.insert(r.as_slice()))
            .cloned()
            .collect();
        Table {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// New table with one more column on the right.
    pub fn with_column(&self, field: Field, values: Vec<Value>) -> TableResult<Table> {
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLength {
                column: field.name,
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        for (row_idx, cell) in values.iter().enumerate() {
            check_cell(row_idx, &field, cell)?;
        }

        let schema = self.schema.with_field(field)?;
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, cell)| {
                let mut row = row.clone();
                row.push(cell);
                row
            })
            .collect();
        Ok(Table { schema, rows })
    }
}

fn check_cell(row: usize, field: &Field, cell: &Value) -> TableResult<()> {
    match cell.data_type() {
        Some(found) if found != field.dtype => Err(TableError::TypeMismatch {
            row,
            column: field.name.clone(),
            expected: field.dtype,
            found,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Str),
            Field::new("qty", DataType::Int),
            Field::new("price", DataType::Float),
        ])
        .unwrap();
        Table::new(
            schema,
            vec![
                vec!["a".into(), Value::Int(1), Value::Float(2.5)],
                vec!["b".into(), Value::Int(2), Value::Null],
                vec!["a".into(), Value::Int(1), Value::Float(2.5)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let err = Schema::new(vec![
            Field::new("id", DataType::Str),
            Field::new("id", DataType::Int),
        ])
        .unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("id".into()));
    }

    #[test]
    fn test_row_width_checked() {
        let schema = Schema::new(vec![Field::new("id", DataType::Str)]).unwrap();
        let err = Table::new(schema, vec![vec!["a".into(), Value::Int(1)]]).unwrap_err();
        assert!(matches!(err, TableError::RowWidth { row: 0, expected: 1, found: 2 }));
    }

    #[test]
    fn test_cell_type_checked() {
        let schema = Schema::new(vec![Field::new("qty", DataType::Int)]).unwrap();
        let err = Table::new(schema, vec![vec!["x".into()]]).unwrap_err();
        assert!(matches!(err, TableError::TypeMismatch { expected: DataType::Int, found: DataType::Str, .. }));
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let table = sample().distinct();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.value(0, "id"), Some(&Value::from("a")));
        assert_eq!(table.value(1, "id"), Some(&Value::from("b")));
    }

    #[test]
    fn test_filter_is_stable() {
        let table = sample().filter(|row| row[0] == Value::from("a"));
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.schema(), sample().schema());
    }

    #[test]
    fn test_with_column_appends() {
        let table = sample()
            .with_column(
                Field::new("flag", DataType::Int),
                vec![Value::Int(0), Value::Int(1), Value::Null],
            )
            .unwrap();
        assert_eq!(table.schema().names(), vec!["id", "qty", "price", "flag"]);
        assert_eq!(table.value(1, "flag"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_with_column_length_mismatch() {
        let err = sample()
            .with_column(Field::new("flag", DataType::Int), vec![Value::Int(0)])
            .unwrap_err();
        assert!(matches!(err, TableError::ColumnLength { expected: 3, found: 1, .. }));
    }

    #[test]
    fn test_float_equality_is_canonical() {
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_ordering_groups_by_kind() {
        let mut values = vec![
            Value::from("b"),
            Value::Float(1.5),
            Value::Null,
            Value::Int(2),
            Value::from("a"),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Float(1.5),
                Value::Int(2),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn test_display_keeps_float_point() {
        assert_eq!(Value::Float(20.0).to_string(), "20.0");
        assert_eq!(Value::Null.to_string(), "");
    }

    #[test]
    fn test_serialize_null_and_datetime() {
        let dt = chrono::NaiveDate::from_ymd_opt(2010, 12, 1)
            .unwrap()
            .and_hms_opt(8, 26, 0)
            .unwrap();
        assert_eq!(serde_json::to_value(Value::Null).unwrap(), serde_json::Value::Null);
        assert_eq!(
            serde_json::to_value(Value::DateTime(dt)).unwrap(),
            serde_json::json!("2010-12-01T08:26:00")
        );
    }
}
