//! Loading row data from JSON, YAML or CSV.

use rowpilot_common::row::{CellValue, RowData};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Column name given to rows loaded from a plain list of values.
pub const VALUE_COLUMN: &str = "value";

#[derive(Debug, Error)]
pub enum RowsError {
    #[error("Failed to read data file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON data: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid YAML data: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unsupported data file '{0}' (expected .json, .yaml, .yml or .csv)")]
    UnsupportedFormat(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Json,
    Yaml,
    Csv,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" => Some(DataFormat::Json),
            "yaml" | "yml" => Some(DataFormat::Yaml),
            "csv" => Some(DataFormat::Csv),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(
    untagged,
    expecting = "a list of objects, a single object or a list of scalar values"
)]
enum RowsDocument {
    Rows(Vec<RowData>),
    Values(Vec<CellValue>),
    Single(RowData),
}

impl From<RowsDocument> for Vec<RowData> {
    fn from(doc: RowsDocument) -> Self {
        match doc {
            RowsDocument::Rows(rows) => rows,
            RowsDocument::Values(values) => values
                .into_iter()
                .map(|v| RowData::from_pairs([(VALUE_COLUMN, v)]))
                .collect(),
            RowsDocument::Single(row) => vec![row],
        }
    }
}

pub fn parse_rows(content: &str, format: DataFormat) -> Result<Vec<RowData>, RowsError> {
    let doc: RowsDocument = match format {
        DataFormat::Json => serde_json::from_str(content)?,
        DataFormat::Yaml => serde_yaml::from_str(content)?,
        DataFormat::Csv => return parse_csv(content),
    };
    Ok(doc.into())
}

/// CSV with a header line. Columns keep the header order and cells are
/// typed the way JSON scalars would be.
fn parse_csv(content: &str) -> Result<Vec<RowData>, RowsError> {
    let mut reader = csv::ReaderBuilder::new().from_reader(content.as_bytes());
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = RowData::new();
        for (name, cell) in headers.iter().zip(record.iter()) {
            row.insert(name, csv_cell(cell));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn csv_cell(raw: &str) -> CellValue {
    if raw.is_empty() {
        return CellValue::Null;
    }
    // Zero-padded codes such as "0451" stay text.
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    if digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.") {
        return CellValue::Text(raw.to_string());
    }
    if let Ok(i) = raw.parse::<i64>() {
        return CellValue::Integer(i);
    }
    // Rules out "inf" and "NaN", which f64 would otherwise accept.
    if raw.bytes().any(|b| b.is_ascii_digit())
        && let Ok(f) = raw.parse::<f64>()
    {
        return CellValue::Float(f);
    }
    if raw.eq_ignore_ascii_case("true") {
        return CellValue::Bool(true);
    }
    if raw.eq_ignore_ascii_case("false") {
        return CellValue::Bool(false);
    }
    CellValue::Text(raw.to_string())
}

/// Parse pasted text: JSON, then YAML, then CSV with a header line.
pub fn parse_rows_text(content: &str) -> Result<Vec<RowData>, RowsError> {
    let json_err = match parse_rows(content, DataFormat::Json) {
        Ok(rows) => return Ok(rows),
        Err(e) => e,
    };
    if let Ok(rows) = parse_rows(content, DataFormat::Yaml) {
        return Ok(rows);
    }
    match parse_rows(content, DataFormat::Csv) {
        Ok(rows) if !rows.is_empty() => Ok(rows),
        _ => Err(json_err),
    }
}

pub async fn load_rows(path: &Path) -> Result<Vec<RowData>, RowsError> {
    let format = DataFormat::from_path(path)
        .ok_or_else(|| RowsError::UnsupportedFormat(path.display().to_string()))?;
    let content = tokio::fs::read_to_string(path).await?;
    parse_rows(&content, format)
}
