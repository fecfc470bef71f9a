//! CSV loading and writing for transaction tables.
//!
//! Loading detects the text encoding and the delimiter, then types each
//! column from its header:
//!
//! | Column                                   | Type  |
//! |------------------------------------------|-------|
//! | quantity, `Year`/`Month`/`DayOfWeek`/`Hour` | int   |
//! | unit price, `TotalAmount`                | float |
//! | everything else (ids, timestamps, text)  | str   |
//!
//! Empty cells become [`Value::Null`]. Numeric customer ids exported as
//! floats (`17850.0`) are read back as `17850`.
//!
//! Checkpoints use [`write_with_schema`] and [`parse_with_schema`] instead,
//! which keep cells untrimmed and write nulls as [`NULL_MARKER`].

use serde_json::Value as JsonValue;
use std::io::Write;
use std::path::Path;

use crate::config::ColumnNames;
use crate::error::{CsvError, CsvResult};
use crate::models::columns;
use crate::table::{DataType, Field, Schema, Table, Value, DATETIME_FORMAT};

/// Result of loading a CSV with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    pub table: Table,
    /// Detected encoding
    pub encoding: String,
    /// Detected delimiter
    pub delimiter: char,
    pub headers: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string; unknown encodings fall back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Printable form of a delimiter.
pub fn format_delimiter(d: char) -> &'static str {
    match d {
        ';' => ";",
        ',' => ",",
        '\t' => "\\t",
        '|' => "|",
        _ => "?",
    }
}

/// Pick the delimiter that occurs most often on the header line.
pub fn detect_delimiter(content: &str) -> char {
    let header = content.lines().next().unwrap_or("");

    [',', ';', '\t', '|']
        .into_iter()
        .map(|sep| (sep, header.matches(sep).count()))
        .fold((',', 0), |best, cur| if cur.1 > best.1 { cur } else { best })
        .0
}

/// Column type assigned to a raw header.
pub fn column_type(header: &str, names: &ColumnNames) -> DataType {
    if header == names.quantity || columns::CALENDAR.contains(&header) {
        DataType::Int
    } else if header == names.unit_price || header == columns::TOTAL_AMOUNT {
        DataType::Float
    } else {
        DataType::Str
    }
}

/// Load a CSV file with encoding and delimiter auto-detection.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P, names: &ColumnNames) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path.as_ref()).map_err(|e| {
        CsvError::new(0, format!("Cannot read file '{}': {}", path.as_ref().display(), e))
    })?;
    parse_bytes_auto(&bytes, names)
}

/// Load CSV bytes with encoding and delimiter auto-detection.
pub fn parse_bytes_auto(bytes: &[u8], names: &ColumnNames) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let table = parse_str(&content, delimiter, names)?;
    let headers = table.schema().names().into_iter().map(String::from).collect();

    Ok(ParseResult {
        table,
        encoding,
        delimiter,
        headers,
    })
}

/// Load CSV text with an explicit delimiter, typing columns from their headers.
pub fn parse_str(content: &str, delimiter: char, names: &ColumnNames) -> CsvResult<Table> {
    let mut reader = reader(content, delimiter);
    let headers = read_headers(&mut reader)?;

    let fields = headers
        .iter()
        .map(|h| Field::new(h.as_str(), column_type(h, names)))
        .collect();
    let schema = Schema::new(fields).map_err(|e| CsvError::new(1, e.to_string()))?;

    let customer_idx = schema.index_of(&names.customer_id);
    read_rows(reader, schema, |idx, raw, dtype| {
        if Some(idx) == customer_idx {
            parse_cell(normalize_customer_id(raw), dtype)
        } else {
            parse_cell(raw, dtype)
        }
    })
}

/// Drop the `.0` a float export appends to a numeric customer id.
pub fn normalize_customer_id(raw: &str) -> &str {
    match raw.strip_suffix(".0") {
        Some(digits) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => digits,
        _ => raw,
    }
}

/// Load CSV written by [`write_with_schema`] against a known schema.
///
/// Headers must match the schema exactly. Cells are not trimmed, an empty
/// string cell stays an empty string and only [`NULL_MARKER`] reads as null.
pub fn parse_with_schema(content: &str, delimiter: char, schema: &Schema) -> CsvResult<Table> {
    let mut reader = exact_reader(content, delimiter);
    let headers = read_headers(&mut reader)?;

    if headers.iter().map(String::as_str).ne(schema.names()) {
        return Err(CsvError::new(
            1,
            format!("Header [{}] does not match schema [{}]", headers.join(", "), schema.names().join(", ")),
        ));
    }

    read_rows(reader, schema.clone(), |_, raw, dtype| decode_exact(raw, dtype))
}

fn reader(content: &str, delimiter: char) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes())
}

fn exact_reader(content: &str, delimiter: char) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(csv::Trim::None)
        .from_reader(content.as_bytes())
}

fn read_headers(reader: &mut csv::Reader<&[u8]>) -> CsvResult<Vec<String>> {
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::new(1, "Empty CSV file"));
    }
    Ok(headers)
}

fn read_rows<F>(mut reader: csv::Reader<&[u8]>, schema: Schema, decode: F) -> CsvResult<Table>
where
    F: Fn(usize, &str, DataType) -> Result<Value, String>,
{
    let mut rows = Vec::new();
    let mut record = csv::StringRecord::new();

    while reader.read_record(&mut record)? {
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);

        // Short rows are padded with nulls, extra cells are ignored
        let row = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(idx, field)| {
                let raw = record.get(idx).unwrap_or("");
                decode(idx, raw, field.dtype).map_err(|message| {
                    CsvError::new(line, message)
                        .with_column(field.name.as_str())
                        .with_value(raw)
                })
            })
            .collect::<CsvResult<Vec<Value>>>()?;
        rows.push(row);
    }

    Table::new(schema, rows).map_err(|e| CsvError::new(0, e.to_string()))
}

/// Parse one raw cell into the given type.
pub fn parse_cell(raw: &str, dtype: DataType) -> Result<Value, String> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }
    match dtype {
        DataType::Str => Ok(Value::Str(raw.to_string())),
        DataType::Int => raw
            .parse::<i64>()
            .map(Value::Int)
            .map_err(|_| "expected an integer".to_string()),
        DataType::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| "expected a number".to_string()),
        DataType::DateTime => chrono::NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
            .map(Value::DateTime)
            .map_err(|e| format!("expected a timestamp: {}", e)),
    }
}

/// Inverse of [`encode_exact`].
fn decode_exact(raw: &str, dtype: DataType) -> Result<Value, String> {
    if raw == NULL_MARKER {
        return Ok(Value::Null);
    }
    match dtype {
        DataType::Str => Ok(Value::Str(raw.strip_prefix('\\').unwrap_or(raw).to_string())),
        _ => parse_cell(raw, dtype),
    }
}

// =============================================================================
// Writers
// =============================================================================

/// Null cell in files written by [`write_with_schema`].
///
/// A string that starts with a backslash is written with one extra leading
/// backslash, so the literal text `\N` cannot be mistaken for a null.
pub const NULL_MARKER: &str = "\\N";

fn encode_exact(value: &Value) -> String {
    match value {
        Value::Null => NULL_MARKER.to_string(),
        Value::Str(s) if s.starts_with('\\') => format!("\\{}", s),
        other => other.to_string(),
    }
}

/// Write a table so that [`parse_with_schema`] reads back an equal table.
pub fn write_with_schema<W: Write>(table: &Table, writer: W) -> CsvResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(table.schema().names())?;
    for row in table.rows() {
        out.write_record(row.iter().map(encode_exact))?;
    }
    out.flush()
        .map_err(|e| CsvError::new(0, format!("Cannot write CSV: {}", e)))
}

/// Write a table as comma-separated CSV with a header row.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> CsvResult<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(table.schema().names())?;
    for row in table.rows() {
        out.write_record(row.iter().map(|v| v.to_string()))?;
    }
    out.flush()
        .map_err(|e| CsvError::new(0, format!("Cannot write CSV: {}", e)))
}

/// A table as a JSON array of objects keyed by column name.
pub fn table_to_json(table: &Table) -> JsonValue {
    let names = table.schema().names();
    let records = table
        .rows()
        .iter()
        .map(|row| {
            let obj = names
                .iter()
                .zip(row)
                .map(|(name, cell)| {
                    (name.to_string(), serde_json::to_value(cell).unwrap_or(JsonValue::Null))
                })
                .collect();
            JsonValue::Object(obj)
        })
        .collect();
    JsonValue::Array(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RETAIL_CSV: &str = "InvoiceNo,StockCode,Description,Quantity,InvoiceDate,UnitPrice,CustomerID,Country\n\
        536365,85123A,WHITE HANGING HEART T-LIGHT HOLDER,6,2010-12-01 08:26:00,2.55,17850.0,United Kingdom\n\
        536365,71053,WHITE METAL LANTERN,6,2010-12-01 08:26:00,3.39,17850.0,United Kingdom\n\
        C536379,D,Discount,-1,2010-12-01 09:41:00,27.5,,United Kingdom\n";

    fn names() -> ColumnNames {
        ColumnNames::default()
    }

    #[test]
    fn test_parse_retail_export() {
        let table = parse_str(RETAIL_CSV, ',', &names()).unwrap();

        assert_eq!(table.row_count(), 3);
        assert_eq!(table.schema().field("Quantity").unwrap().dtype, DataType::Int);
        assert_eq!(table.schema().field("UnitPrice").unwrap().dtype, DataType::Float);
        assert_eq!(table.schema().field("InvoiceDate").unwrap().dtype, DataType::Str);
        assert_eq!(table.value(0, "Quantity"), Some(&Value::Int(6)));
        assert_eq!(table.value(1, "UnitPrice"), Some(&Value::Float(3.39)));
        assert_eq!(table.value(2, "Quantity"), Some(&Value::Int(-1)));
    }

    #[test]
    fn test_customer_id_float_suffix_stripped() {
        let table = parse_str(RETAIL_CSV, ',', &names()).unwrap();
        assert_eq!(table.value(0, "CustomerID"), Some(&Value::from("17850")));
    }

    #[test]
    fn test_empty_cells_are_null() {
        let table = parse_str(RETAIL_CSV, ',', &names()).unwrap();
        assert_eq!(table.value(2, "CustomerID"), Some(&Value::Null));
    }

    #[test]
    fn test_short_rows_padded() {
        let table = parse_str("InvoiceNo;StockCode;Quantity\n1;A\n", ';', &names()).unwrap();
        assert_eq!(table.value(0, "Quantity"), Some(&Value::Null));
    }

    #[test]
    fn test_bad_quantity_reports_context() {
        let err = parse_str("InvoiceNo,Quantity\n1,two\n", ',', &names()).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.column.as_deref(), Some("Quantity"));
        assert_eq!(err.value.as_deref(), Some("two"));
    }

    #[test]
    fn test_header_only_gives_empty_table() {
        let table = parse_str("InvoiceNo,StockCode,Quantity,UnitPrice\n", ',', &names()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.schema().len(), 4);
    }

    #[test]
    fn test_empty_csv_error() {
        let err = parse_str("", ',', &names()).unwrap_err();
        assert!(err.message.contains("Empty"));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto(b"InvoiceNo;Quantity\n1;2\n3;4\n", &names()).unwrap();
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.headers, vec!["InvoiceNo", "Quantity"]);
        assert_eq!(result.table.row_count(), 2);
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_csv_round_trip_with_schema() {
        let table = parse_str(RETAIL_CSV, ',', &names()).unwrap();
        let mut buf = Vec::new();
        write_with_schema(&table, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        let reloaded = parse_with_schema(&text, ',', table.schema()).unwrap();
        assert_eq!(reloaded, table);
    }

    #[test]
    fn test_exact_round_trip_keeps_blank_and_padded_strings() {
        let schema = Schema::new(vec![
            Field::new("Description", DataType::Str),
            Field::new("UnitPrice", DataType::Float),
        ])
        .unwrap();
        let table = Table::new(
            schema.clone(),
            vec![
                vec![Value::from(""), Value::Float(1.5)],
                vec![Value::from(" padded "), Value::Null],
                vec![Value::Null, Value::Float(-0.25)],
                vec![Value::from("\\N"), Value::Float(2.0)],
                vec![Value::from("\\x"), Value::Float(3.0)],
            ],
        )
        .unwrap();

        let mut buf = Vec::new();
        write_with_schema(&table, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();

        let reloaded = parse_with_schema(&text, ',', &schema).unwrap();
        assert_eq!(reloaded, table);
        assert_eq!(reloaded.value(0, "Description"), Some(&Value::from("")));
        assert_eq!(reloaded.value(1, "Description"), Some(&Value::from(" padded ")));
        assert_eq!(reloaded.value(2, "Description"), Some(&Value::Null));
    }

    #[test]
    fn test_customer_id_suffix_only_stripped_from_numbers() {
        assert_eq!(normalize_customer_id("17850.0"), "17850");
        assert_eq!(normalize_customer_id("17850"), "17850");
        assert_eq!(normalize_customer_id("C.0"), "C.0");
        assert_eq!(normalize_customer_id(".0"), ".0");
        assert_eq!(normalize_customer_id("12.5.0"), "12.5.0");

        let table = parse_str("InvoiceNo,CustomerID\n1,C.0\n", ',', &names()).unwrap();
        assert_eq!(table.value(0, "CustomerID"), Some(&Value::from("C.0")));
    }

    #[test]
    fn test_format_delimiter() {
        assert_eq!(format_delimiter(';'), ";");
        assert_eq!(format_delimiter('\t'), "\\t");
        assert_eq!(format_delimiter('#'), "?");
    }

    #[test]
    fn test_schema_header_mismatch() {
        let schema = Schema::new(vec![Field::new("InvoiceNo", DataType::Str)]).unwrap();
        let err = parse_with_schema("Invoice\n1\n", ',', &schema).unwrap_err();
        assert!(err.message.contains("does not match"));
    }

    #[test]
    fn test_table_to_json() {
        let table = parse_str("InvoiceNo,Quantity,CustomerID\n1,2,\n", ',', &names()).unwrap();
        let json = table_to_json(&table);
        assert_eq!(json, serde_json::json!([{ "InvoiceNo": "1", "Quantity": 2, "CustomerID": null }]));
    }
}
