//! Format resolution and decoding of raw source bytes into [`RawTable`]s.
//!
//! Every source flows through this module before normalization. It provides:
//!
//! - **Format resolution**: extension-based detection (`.csv`, `.xlsx`,
//!   `.json`) with a content-type fallback for remote sources.
//! - **Encoding**: text sources are decoded via `encoding_rs`, defaulting to
//!   UTF-8 with BOM removal.
//! - **Decoders**: CSV through the `csv` crate, JSON through `serde_json`
//!   and XLSX through `calamine` (first worksheet, first row as header).

use std::{collections::HashMap, io::Cursor, str::FromStr};

use anyhow::{Result, anyhow};
use calamine::{Data, Reader, Xlsx};
use encoding_rs::{Encoding, UTF_8};
use serde::{Deserialize, Serialize};

use crate::data::Value;
use crate::error::ReportError;

/// A decoded but not yet normalized table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<Value>>>,
}

impl RawTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Xlsx,
    Json,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xlsx" => Some(SourceFormat::Xlsx),
            "json" => Some(SourceFormat::Json),
            _ => None,
        }
    }

    /// Maps a declared `Content-Type`, ignoring parameters such as `charset`.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "text/csv" | "application/csv" => Some(SourceFormat::Csv),
            "application/json" => Some(SourceFormat::Json),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Some(SourceFormat::Xlsx)
            }
            other if other.ends_with("+json") => Some(SourceFormat::Json),
            _ => None,
        }
    }
}

impl FromStr for SourceFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        SourceFormat::from_extension(value.trim().trim_start_matches('.'))
            .ok_or_else(|| anyhow!("Unknown source format '{value}' (expected csv, xlsx or json)"))
    }
}

/// Extension of a file name or URL path, ignoring any query or fragment.
pub fn extension_of(name: &str) -> Option<&str> {
    let path = name.split(['?', '#']).next().unwrap_or(name);
    let file = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = file.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some(ext)
}

pub fn resolve_format(
    name: &str,
    declared: Option<SourceFormat>,
    content_type: Option<&str>,
) -> Result<SourceFormat, ReportError> {
    if let Some(format) = declared {
        return Ok(format);
    }
    let extension = extension_of(name);
    if let Some(format) = extension.and_then(SourceFormat::from_extension) {
        return Ok(format);
    }
    if let Some(format) = content_type.and_then(SourceFormat::from_content_type) {
        return Ok(format);
    }
    let detail = match (extension, content_type) {
        (Some(ext), _) => Some(format!("extension '.{ext}'")),
        (None, Some(ct)) => Some(format!("content type '{ct}'")),
        (None, None) => None,
    };
    Err(ReportError::unsupported(name, detail))
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_table(
    name: &str,
    format: SourceFormat,
    bytes: &[u8],
    encoding: &'static Encoding,
) -> Result<RawTable, ReportError> {
    let decoded = match format {
        SourceFormat::Csv => decode_bytes(bytes, encoding).and_then(|text| decode_csv(&text)),
        SourceFormat::Json => decode_bytes(bytes, encoding).and_then(|text| decode_json(&text)),
        SourceFormat::Xlsx => decode_xlsx(bytes),
    };
    decoded.map_err(|err| ReportError::data_format(name, format!("{err:#}")))
}

pub fn open_csv_reader(text: &str) -> csv::Reader<&[u8]> {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(b',')
        .double_quote(true)
        .flexible(true);
    builder.from_reader(text.as_bytes())
}

pub fn decode_csv(text: &str) -> Result<RawTable> {
    let mut reader = open_csv_reader(text);
    let headers = reader
        .headers()
        .map_err(|err| anyhow!("Reading CSV header: {err}"))?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(anyhow!("CSV input has no header row"));
    }
    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|err| anyhow!("Reading CSV row {}: {err}", idx + 2))?;
        // Short rows are padded with missing cells; extra fields have no column.
        if record.len() > headers.len() {
            return Err(anyhow!(
                "CSV row {} has {} fields but the header has {}",
                idx + 2,
                record.len(),
                headers.len()
            ));
        }
        let mut row = record
            .iter()
            .map(|field| (!field.is_empty()).then(|| Value::String(field.to_string())))
            .collect::<Vec<_>>();
        row.resize(headers.len(), None);
        rows.push(row);
    }
    Ok(RawTable { headers, rows })
}

/// Accepts an array of row objects or a single object (one row). Columns are
/// the union of keys in first-seen order.
pub fn decode_json(text: &str) -> Result<RawTable> {
    let parsed: serde_json::Value =
        serde_json::from_str(text).map_err(|err| anyhow!("Parsing JSON: {err}"))?;
    let objects = match parsed {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                serde_json::Value::Object(map) => Ok(map),
                other => Err(anyhow!(
                    "JSON element {idx} is {} rather than an object",
                    json_type_name(&other)
                )),
            })
            .collect::<Result<Vec<_>>>()?,
        serde_json::Value::Object(map) => vec![map],
        other => {
            return Err(anyhow!(
                "Expected a JSON array or object, found {}",
                json_type_name(&other)
            ));
        }
    };

    let mut headers: Vec<String> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for object in &objects {
        for key in object.keys() {
            if !positions.contains_key(key) {
                positions.insert(key.clone(), headers.len());
                headers.push(key.clone());
            }
        }
    }
    let rows = objects
        .into_iter()
        .map(|object| {
            let mut row = vec![None; headers.len()];
            for (key, value) in object {
                if let Some(&idx) = positions.get(&key) {
                    row[idx] = json_to_value(value);
                }
            }
            row
        })
        .collect();
    Ok(RawTable { headers, rows })
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

fn json_to_value(value: serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Boolean(b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Value::Integer(i)),
            None => n.as_f64().map(Value::Float),
        },
        serde_json::Value::String(s) => Some(Value::String(s)),
        nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
            Some(Value::String(nested.to_string()))
        }
    }
}

pub fn decode_xlsx(bytes: &[u8]) -> Result<RawTable> {
    let mut workbook = Xlsx::new(Cursor::new(bytes))
        .map_err(|err| anyhow!("Opening workbook: {err}"))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("Workbook contains no worksheets"))?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| anyhow!("Reading worksheet '{sheet_name}': {err}"))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(RawTable::default());
    };
    let headers = header
        .iter()
        .enumerate()
        .map(|(idx, cell)| match cell_to_value(cell) {
            Some(value) => value.as_display(),
            None => format!("column_{}", idx + 1),
        })
        .collect::<Vec<_>>();
    let rows = rows
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .map(|row| {
            let mut values = row.iter().map(cell_to_value).collect::<Vec<_>>();
            values.resize(headers.len(), None);
            values
        })
        .collect();
    Ok(RawTable { headers, rows })
}

fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Float(f) => Some(Value::Float(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(dt) => dt.as_datetime().map(Value::DateTime),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}
