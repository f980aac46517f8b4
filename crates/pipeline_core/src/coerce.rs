//! Per-cell coercion of JSON records into warehouse values.

use std::io;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::ser::Formatter;
use serde_json::{Map, Value};

use crate::error::TransformError;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub type Record = Map<String, Value>;

/// Returns the records stored as an array under `key` of a JSON document.
pub fn records_from_document(document: &[u8], key: &str) -> Result<Vec<Record>, TransformError> {
    let mut document: Value = serde_json::from_slice(document)
        .map_err(|error| TransformError::MalformedPayload(error.to_string()))?;
    let Some(items) = document.get_mut(key).map(Value::take) else {
        return Err(TransformError::MalformedPayload(format!(
            "expected a top-level '{key}' field"
        )));
    };
    let Value::Array(items) = items else {
        return Err(TransformError::MalformedPayload(format!(
            "'{key}' must be an array of records"
        )));
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(record) => Ok(record),
            other => Err(TransformError::MalformedPayload(format!(
                "'{key}'[{index}] is not a record: {other}"
            ))),
        })
        .collect()
}

/// Fails when a declared column is carried by none of the records.
///
/// A payload without records declares no columns, so it passes.
pub fn require_columns(records: &[Record], columns: &[&str]) -> Result<(), TransformError> {
    if records.is_empty() {
        return Ok(());
    }
    for column in columns {
        if !records.iter().any(|record| record.contains_key(*column)) {
            return Err(TransformError::missing_column(column));
        }
    }
    Ok(())
}

/// One record together with its position in the payload, for error context.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    index: usize,
    fields: &'a Record,
}

impl<'a> RecordView<'a> {
    pub fn new(index: usize, fields: &'a Record) -> Self {
        Self { index, fields }
    }

    /// Field value; a key missing from this record reads as null.
    pub fn get(&self, column: &str) -> &'a Value {
        self.fields.get(column).unwrap_or(&Value::Null)
    }

    pub fn text(&self, column: &str) -> Result<Option<String>, TransformError> {
        match self.get(column) {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(text.clone())),
            Value::Number(number) => Ok(Some(number.to_string())),
            Value::Bool(true) => Ok(Some("True".to_string())),
            Value::Bool(false) => Ok(Some("False".to_string())),
            other => Err(self.error(column, other, "text")),
        }
    }

    pub fn required_text(&self, column: &str) -> Result<String, TransformError> {
        self.text(column)?
            .ok_or_else(|| self.error(column, &Value::Null, "text"))
    }

    /// Truthiness of the field: null, `false`, zero and empty strings,
    /// arrays and objects are false; everything else is true.
    pub fn boolean(&self, column: &str) -> bool {
        match self.get(column) {
            Value::Null => false,
            Value::Bool(value) => *value,
            Value::Number(number) => number.as_f64().is_some_and(|value| value != 0.0),
            Value::String(text) => !text.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(fields) => !fields.is_empty(),
        }
    }

    pub fn integer(&self, column: &str) -> Result<i64, TransformError> {
        let value = self.get(column);
        let parsed = match value {
            Value::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().and_then(truncate_to_i64)),
            Value::String(text) => text.trim().parse::<i64>().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.error(column, value, "integer"))
    }

    pub fn date(&self, column: &str) -> Result<Option<NaiveDate>, TransformError> {
        match self.get(column) {
            Value::Null => Ok(None),
            Value::String(text) => NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(Some)
                .map_err(|_| self.error(column, &Value::String(text.clone()), "date")),
            other => Err(self.error(column, other, "date")),
        }
    }

    pub fn timestamp(
        &self,
        column: &str,
        format: &str,
    ) -> Result<Option<NaiveDateTime>, TransformError> {
        match self.get(column) {
            Value::Null => Ok(None),
            Value::String(text) => NaiveDateTime::parse_from_str(text, format)
                .map(Some)
                .map_err(|_| self.error(column, &Value::String(text.clone()), "timestamp")),
            other => Err(self.error(column, other, "timestamp")),
        }
    }

    /// The field re-serialised as JSON text; a key missing from the record
    /// yields `None`.
    pub fn json_text(&self, column: &str) -> Result<Option<String>, TransformError> {
        match self.fields.get(column) {
            None => Ok(None),
            Some(value) => python_json_dumps(value)
                .map(Some)
                .map_err(|_| self.error(column, value, "json")),
        }
    }

    pub fn error(&self, column: &str, value: &Value, expected: &'static str) -> TransformError {
        TransformError::coercion(self.index, column, value, expected)
    }
}

pub fn truncate_to_i64(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return None;
    }
    Some(truncated as i64)
}

/// Serialises `value` the way Python's `json.dumps` does with default
/// arguments: `", "` and `": "` separators, key order kept, non-ASCII
/// characters escaped as `\uXXXX` and floats in `repr` form.
pub fn python_json_dumps(value: &Value) -> Result<String, serde_json::Error> {
    let mut serializer = serde_json::Serializer::with_formatter(Vec::new(), PythonJsonFormatter);
    value.serialize(&mut serializer)?;
    // Every non-ASCII character was escaped, so the output is ASCII.
    Ok(String::from_utf8_lossy(&serializer.into_inner()).into_owned())
}

struct PythonJsonFormatter;

impl Formatter for PythonJsonFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }

    fn write_f64<W>(&mut self, writer: &mut W, value: f64) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(python_float_repr(value).as_bytes())
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{unit:04x}")?;
                }
            }
        }
        Ok(())
    }
}

/// Python's `repr(float)`: shortest round-trip digits, positional between
/// 1e-4 and 1e16, otherwise scientific with a signed two-digit exponent.
fn python_float_repr(value: f64) -> String {
    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return scientific;
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|ch| *ch != '.').collect();

    if (-4..16).contains(&exponent) {
        if exponent < 0 {
            let zeros = "0".repeat((-exponent - 1) as usize);
            return format!("{sign}0.{zeros}{digits}");
        }
        let integer_len = exponent as usize + 1;
        if digits.len() <= integer_len {
            let zeros = "0".repeat(integer_len - digits.len());
            format!("{sign}{digits}{zeros}.0")
        } else {
            let (integer, fraction) = digits.split_at(integer_len);
            format!("{sign}{integer}.{fraction}")
        }
    } else {
        let (first, rest) = digits.split_at(1);
        let fraction = if rest.is_empty() {
            String::new()
        } else {
            format!(".{rest}")
        };
        let exponent_sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{sign}{first}{fraction}e{exponent_sign}{:02}",
            exponent.unsigned_abs()
        )
    }
}
