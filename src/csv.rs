//! CSV encode/decode for device records.
//!
//! The encoder quotes any field containing a comma, double quote, or newline
//! and doubles internal quotes. The decoder is deliberately simple: rows are
//! split on raw commas before quotes are stripped, so a quoted field that
//! itself contains a comma is mis-split. Round-tripping is only guaranteed
//! for values without embedded commas or newlines.

use thiserror::Error;

use crate::entity::device::{Device, DeviceInput};

/// Column order for exported files. Decode maps columns by header name
/// instead, so imports may reorder or omit the optional ones.
pub const COLUMNS: [&str; 12] = [
    "id",
    "name",
    "type",
    "serial_number",
    "manufacturer",
    "model",
    "status",
    "location",
    "assigned_to",
    "notes",
    "date_added",
    "date_updated",
];

const REQUIRED_COLUMNS: [&str; 3] = ["name", "type", "status"];

/// Structural problems found before any row is inserted. Row numbers are
/// 1-based, counting from the first data row.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CsvError {
    #[error("CSV input contains no header row")]
    Empty,
    #[error("CSV is missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("CSV row {row} has {found} columns, expected {expected}")]
    ColumnCount {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("CSV row {row} is missing a value for name, type or status")]
    MissingRequired { row: usize },
}

fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn parse_field(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].replace("\"\"", "\"")
    } else {
        trimmed.to_string()
    }
}

/// Render records as CSV text: header row first, every row terminated by a
/// newline, absent optional values as empty fields.
pub fn encode_devices(devices: &[Device]) -> String {
    let mut out = String::new();
    out.push_str(&COLUMNS.join(","));
    out.push('\n');
    for device in devices {
        let id = device.id.to_string();
        let fields: [&str; 12] = [
            &id,
            &device.name,
            &device.device_type,
            device.serial_number.as_deref().unwrap_or(""),
            device.manufacturer.as_deref().unwrap_or(""),
            device.model.as_deref().unwrap_or(""),
            &device.status,
            device.location.as_deref().unwrap_or(""),
            device.assigned_to.as_deref().unwrap_or(""),
            device.notes.as_deref().unwrap_or(""),
            &device.date_added,
            &device.date_updated,
        ];
        let row: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Parse CSV text into device field sets ready for insertion.
///
/// The first non-empty line is the header; remaining non-empty lines are data
/// rows. `id`, `date_added`, `date_updated` and unknown columns are ignored
/// since the store reassigns them on insert.
pub fn decode_devices(input: &str) -> Result<Vec<DeviceInput>, CsvError> {
    let mut lines = input.lines().filter(|l| !l.trim().is_empty());
    let header = lines.next().ok_or(CsvError::Empty)?;
    let columns: Vec<String> = header.split(',').map(parse_field).collect();
    for required in REQUIRED_COLUMNS {
        if !columns.iter().any(|c| c == required) {
            return Err(CsvError::MissingColumn(required));
        }
    }

    let mut records = Vec::new();
    for (idx, line) in lines.enumerate() {
        let row = idx + 1;
        let values: Vec<String> = line.split(',').map(parse_field).collect();
        if values.len() != columns.len() {
            return Err(CsvError::ColumnCount {
                row,
                expected: columns.len(),
                found: values.len(),
            });
        }
        let mut record = DeviceInput::default();
        for (column, value) in columns.iter().zip(values) {
            match column.as_str() {
                "name" => record.name = Some(value),
                "type" => record.device_type = Some(value),
                "serial_number" => record.serial_number = Some(value),
                "manufacturer" => record.manufacturer = Some(value),
                "model" => record.model = Some(value),
                "status" => record.status = Some(value),
                "location" => record.location = Some(value),
                "assigned_to" => record.assigned_to = Some(value),
                "notes" => record.notes = Some(value),
                _ => {}
            }
        }
        if !record.has_required() {
            return Err(CsvError::MissingRequired { row });
        }
        records.push(record);
    }
    Ok(records)
}
