//! Spreadsheet decoding into an absolute-position cell grid.

use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::coerce::truncate_to_i64;
use crate::error::TransformError;

#[derive(Debug, Clone, PartialEq)]
pub enum SheetCell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Error(String),
}

impl SheetCell {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

/// Cells of one worksheet, addressed from A1 (row 0, column 0) regardless of
/// where the used range starts. Trailing empty rows are dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    rows: Vec<Vec<SheetCell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, mut rows: Vec<Vec<SheetCell>>) -> Self {
        while rows
            .last()
            .is_some_and(|row| row.iter().all(SheetCell::is_empty))
        {
            rows.pop();
        }
        Self {
            name: name.into(),
            rows,
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, column: usize) -> &SheetCell {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&SheetCell::Empty)
    }

    pub fn error(&self, message: impl Into<String>) -> TransformError {
        TransformError::Sheet {
            sheet: self.name.clone(),
            message: message.into(),
        }
    }
}

pub fn read_xlsx_sheet(document: &[u8], sheet_name: &str) -> Result<Sheet, TransformError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(document))
        .map_err(|error| TransformError::MalformedPayload(format!("not an xlsx workbook: {error}")))?;
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|error| TransformError::Sheet {
            sheet: sheet_name.to_string(),
            message: error.to_string(),
        })?;

    let Some((start_row, start_column)) = range.start() else {
        return Ok(Sheet::new(sheet_name, Vec::new()));
    };
    let (start_row, start_column) = (start_row as usize, start_column as usize);

    let mut rows: Vec<Vec<SheetCell>> = Vec::new();
    for (row, column, data) in range.cells() {
        let cell = sheet_cell(data);
        if matches!(cell, SheetCell::Empty) {
            continue;
        }
        let (row, column) = (start_row + row, start_column + column);
        if rows.len() <= row {
            rows.resize_with(row + 1, Vec::new);
        }
        let cells = &mut rows[row];
        if cells.len() <= column {
            cells.resize(column + 1, SheetCell::Empty);
        }
        cells[column] = cell;
    }
    Ok(Sheet::new(sheet_name, rows))
}

fn sheet_cell(data: &Data) -> SheetCell {
    match data {
        Data::Empty => SheetCell::Empty,
        Data::String(text) => SheetCell::Text(text.clone()),
        Data::Int(value) => SheetCell::Number(*value as f64),
        Data::Float(value) => SheetCell::Number(*value),
        Data::Bool(value) => SheetCell::Bool(*value),
        Data::DateTime(value) => value
            .as_datetime()
            .map(SheetCell::DateTime)
            .unwrap_or_else(|| SheetCell::Number(value.as_f64())),
        Data::DateTimeIso(text) => parse_iso_datetime(text)
            .map(SheetCell::DateTime)
            .unwrap_or_else(|| SheetCell::Text(text.clone())),
        Data::DurationIso(text) => SheetCell::Text(text.clone()),
        Data::Error(error) => SheetCell::Error(format!("{error:?}")),
    }
}

fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Date of a header cell: a spreadsheet date, an Excel serial day number,
/// or an ISO / `dd/mm/yyyy` string.
pub fn cell_date(cell: &SheetCell) -> Option<NaiveDate> {
    match cell {
        SheetCell::DateTime(value) => Some(value.date()),
        SheetCell::Number(serial) => excel_serial_date(*serial),
        SheetCell::Text(text) => {
            let text = text.trim();
            parse_iso_datetime(text)
                .map(|value| value.date())
                .or_else(|| NaiveDate::parse_from_str(text, "%d/%m/%Y").ok())
                .or_else(|| {
                    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
                        .ok()
                        .map(|value| value.date())
                })
        }
        _ => None,
    }
}

fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = Duration::try_days(truncate_to_i64(serial)?)?;
    epoch.checked_add_signed(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sheet_drops_trailing_empty_rows() {
        let sheet = Sheet::new(
            "s",
            vec![
                vec![SheetCell::Text("a".to_string())],
                vec![SheetCell::Empty, SheetCell::Text("  ".to_string())],
                vec![],
            ],
        );
        assert_eq!(sheet.height(), 1);
        assert_eq!(sheet.cell(5, 5), &SheetCell::Empty);
    }

    #[test]
    fn header_dates_accept_serials_and_strings() {
        let expected = NaiveDate::from_ymd_opt(2023, 11, 20);
        assert_eq!(cell_date(&SheetCell::Number(45250.0)), expected);
        assert_eq!(cell_date(&SheetCell::Text("2023-11-20".to_string())), expected);
        assert_eq!(cell_date(&SheetCell::Text("20/11/2023".to_string())), expected);
        assert_eq!(cell_date(&SheetCell::Text("Region".to_string())), None);
        assert_eq!(cell_date(&SheetCell::Empty), None);
    }

    #[test]
    fn out_of_range_serials_are_not_dates() {
        assert_eq!(cell_date(&SheetCell::Number(1e15)), None);
        assert_eq!(cell_date(&SheetCell::Number(1e300)), None);
        assert_eq!(cell_date(&SheetCell::Number(f64::INFINITY)), None);
        assert_eq!(cell_date(&SheetCell::Number(0.5)), None);
    }
}
