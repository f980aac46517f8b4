//! NHS England urgent and emergency care daily situation report, general and
//! acute bed occupancy.
//!
//! The source workbook is wide: one block of metric columns per reporting
//! date. The transform reshapes it into one row per trust and date.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::coerce::truncate_to_i64;
use crate::datasets::TransformOutput;
use crate::error::TransformError;
use crate::sheet::{cell_date, read_xlsx_sheet, Sheet, SheetCell};
use crate::table::{Cell, Column, ColumnType, Table};

pub const NAME_COLUMN: &str = "Name";
pub const CODE_COLUMN: &str = "Code";
pub const REGION_COLUMN: &str = "NHS England Region";
pub const DATE_COLUMN: &str = "Date";

const METRIC_COUNT: usize = 3;

pub const METRIC_COLUMNS: [&str; METRIC_COUNT] = [
    "Total G&A Beds Open",
    "Total G&A Beds Unavailable to non-covid admissions \"void\"",
    "Total G&A beds occ'd",
];

/// Cell positions of a published workbook format. Positions are zero-based
/// and absolute (row 0 is spreadsheet row 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SitrepLayout {
    pub sheet_name: &'static str,
    pub date_header_row: usize,
    pub metric_header_row: usize,
    pub region_column: usize,
    pub code_column: usize,
    pub name_column: usize,
    pub first_value_column: usize,
    /// Offset, counted from the first row below the headers, of a row that
    /// is not trust data.
    pub discarded_data_row: usize,
}

impl SitrepLayout {
    pub const V1: Self = Self {
        sheet_name: "Total G&A beds",
        date_header_row: 13,
        metric_header_row: 14,
        region_column: 1,
        code_column: 3,
        name_column: 4,
        first_value_column: 5,
        discarded_data_row: 2,
    };

    fn first_data_row(&self) -> usize {
        self.metric_header_row + 1
    }
}

pub fn transform_document(document: &[u8]) -> Result<TransformOutput, TransformError> {
    let layout = SitrepLayout::V1;
    let sheet = read_xlsx_sheet(document, layout.sheet_name)?;
    transform(&sheet, &layout)
}

pub fn output_columns() -> Vec<Column> {
    let mut columns = vec![
        Column::new(NAME_COLUMN, ColumnType::Text),
        Column::new(CODE_COLUMN, ColumnType::Text),
        Column::new(REGION_COLUMN, ColumnType::Text),
        Column::new(DATE_COLUMN, ColumnType::Date),
    ];
    columns.extend(
        METRIC_COLUMNS
            .iter()
            .map(|name| Column::new(*name, ColumnType::Integer)),
    );
    columns
}

pub fn transform(sheet: &Sheet, layout: &SitrepLayout) -> Result<TransformOutput, TransformError> {
    if sheet.height() <= layout.metric_header_row {
        return Err(sheet.error(format!(
            "expected header rows {} and {}, sheet has {} rows",
            layout.date_header_row + 1,
            layout.metric_header_row + 1,
            sheet.height()
        )));
    }

    let groups = date_groups(sheet, layout)?;
    let mut table = Table::new(output_columns());
    let data_rows = layout.first_data_row()..sheet.height();
    let records_read = data_rows.len();

    for (offset, row) in data_rows.enumerate() {
        if offset == layout.discarded_data_row {
            continue;
        }
        let name = text_cell(sheet.cell(row, layout.name_column));
        let code = text_cell(sheet.cell(row, layout.code_column));
        let region = text_cell(sheet.cell(row, layout.region_column));

        for (date, columns) in &groups {
            let values: Vec<&SheetCell> = columns
                .iter()
                .map(|column| sheet.cell(row, *column))
                .collect();
            if values.iter().all(|cell| cell.is_empty()) {
                continue;
            }

            let mut cells = vec![
                Cell::from(name.clone()),
                Cell::from(code.clone()),
                Cell::from(region.clone()),
                Cell::Date(*date),
            ];
            for (metric, value) in METRIC_COLUMNS.iter().zip(values) {
                let count = integer_cell(value).ok_or_else(|| {
                    TransformError::coercion(offset, metric, describe(value), "integer")
                })?;
                cells.push(Cell::Integer(count));
            }
            table.push_row(cells)?;
        }
    }

    Ok(TransformOutput {
        records_read,
        table,
    })
}

/// Value column of each metric, per reporting date. Dates come from the
/// upper header row, carried right across merged cells.
fn date_groups(
    sheet: &Sheet,
    layout: &SitrepLayout,
) -> Result<BTreeMap<NaiveDate, [usize; METRIC_COUNT]>, TransformError> {
    let mut partial: BTreeMap<NaiveDate, [Option<usize>; METRIC_COUNT]> = BTreeMap::new();
    let mut current_date: Option<NaiveDate> = None;

    for column in layout.first_value_column..sheet.width() {
        let date_cell = sheet.cell(layout.date_header_row, column);
        if !date_cell.is_empty() {
            let date = cell_date(date_cell).ok_or_else(|| {
                sheet.error(format!(
                    "header cell at column {column} is not a date: {}",
                    describe(date_cell)
                ))
            })?;
            current_date = Some(date);
        }

        let metric = match sheet.cell(layout.metric_header_row, column) {
            SheetCell::Text(text) if !text.trim().is_empty() => text.trim().to_string(),
            SheetCell::Empty => continue,
            other => {
                return Err(sheet.error(format!(
                    "metric header at column {column} is not text: {}",
                    describe(other)
                )))
            }
        };
        let Some(slot) = METRIC_COLUMNS.iter().position(|known| *known == metric) else {
            return Err(sheet.error(format!("unexpected metric column '{metric}'")));
        };
        let Some(date) = current_date else {
            return Err(sheet.error(format!("metric column {column} has no date header")));
        };

        let entry = partial.entry(date).or_default();
        if entry[slot].replace(column).is_some() {
            return Err(sheet.error(format!("metric '{metric}' repeated for {date}")));
        }
    }

    if partial.is_empty() {
        return Err(TransformError::missing_column(METRIC_COLUMNS[0]));
    }

    partial
        .into_iter()
        .map(|(date, slots)| {
            let mut columns = [0usize; METRIC_COUNT];
            for (index, slot) in slots.iter().enumerate() {
                columns[index] = slot.ok_or_else(|| {
                    TransformError::missing_column(&format!("{} ({date})", METRIC_COLUMNS[index]))
                })?;
            }
            Ok((date, columns))
        })
        .collect()
}

fn text_cell(cell: &SheetCell) -> Option<String> {
    match cell {
        SheetCell::Empty => None,
        SheetCell::Text(text) => Some(text.clone()),
        SheetCell::Number(value) if value.fract() == 0.0 => Some(format!("{value:.0}")),
        SheetCell::Number(value) => Some(value.to_string()),
        SheetCell::Bool(true) => Some("True".to_string()),
        SheetCell::Bool(false) => Some("False".to_string()),
        SheetCell::DateTime(value) => Some(value.to_string()),
        SheetCell::Error(error) => Some(error.clone()),
    }
}

fn integer_cell(cell: &SheetCell) -> Option<i64> {
    match cell {
        SheetCell::Number(value) => truncate_to_i64(*value),
        SheetCell::Text(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn describe(cell: &SheetCell) -> String {
    match cell {
        SheetCell::Empty => "<empty>".to_string(),
        SheetCell::Text(text) => format!("{text:?}"),
        SheetCell::Number(value) => value.to_string(),
        SheetCell::Bool(value) => value.to_string(),
        SheetCell::DateTime(value) => value.to_string(),
        SheetCell::Error(error) => error.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> SheetCell {
        SheetCell::Text(value.to_string())
    }

    fn num(value: f64) -> SheetCell {
        SheetCell::Number(value)
    }

    fn date(day: u32) -> SheetCell {
        SheetCell::DateTime(
            NaiveDate::from_ymd_opt(2023, 11, day)
                .and_then(|value| value.and_hms_opt(0, 0, 0))
                .expect("valid date"),
        )
    }

    /// A sheet in the V1 layout with two dates (listed newest first) and the
    /// given data rows, each `[region, code, name, six values]`.
    fn sitrep_sheet(data: Vec<Vec<SheetCell>>) -> Sheet {
        let mut rows = vec![vec![]; 13];
        rows[0] = vec![SheetCell::Empty, text("Daily SitRep")];

        let mut dates = vec![SheetCell::Empty; 5];
        dates.extend([date(21), SheetCell::Empty, SheetCell::Empty]);
        dates.extend([date(20), SheetCell::Empty, SheetCell::Empty]);
        rows.push(dates);

        let mut metrics = vec![
            SheetCell::Empty,
            text("NHS England Region"),
            SheetCell::Empty,
            text("Code"),
            text("Name"),
        ];
        for _ in 0..2 {
            metrics.extend(METRIC_COLUMNS.iter().map(|name| text(&format!(" {name} "))));
        }
        rows.push(metrics);

        for values in data {
            if values.is_empty() {
                rows.push(values);
                continue;
            }
            let mut row = vec![SheetCell::Empty, values[0].clone(), SheetCell::Empty];
            row.extend(values[1..].iter().cloned());
            rows.push(row);
        }
        Sheet::new(SitrepLayout::V1.sheet_name, rows)
    }

    fn trust(region: &str, code: &str, name: &str, values: [Option<f64>; 6]) -> Vec<SheetCell> {
        let mut row = vec![text(region), text(code), text(name)];
        row.extend(values.iter().map(|value| value.map(num).unwrap_or(SheetCell::Empty)));
        row
    }

    fn england_rows() -> Vec<Vec<SheetCell>> {
        vec![
            trust("-", "-", "ENGLAND", [Some(1.0); 6]),
            vec![],
            trust("", "", "", [Some(9.0); 6]),
        ]
    }

    #[test]
    fn reshapes_wide_dates_into_long_rows() {
        let mut data = england_rows();
        data.push(trust(
            "London",
            "R1K",
            "London North West",
            [Some(900.0), Some(12.0), Some(850.0), Some(910.0), Some(10.0), Some(861.0)],
        ));
        let sheet = sitrep_sheet(data);

        let output = transform(&sheet, &SitrepLayout::V1).expect("transform should succeed");
        let table = output.table;

        assert_eq!(output.records_read, 4);
        // ENGLAND x 2 dates + London North West x 2 dates.
        assert_eq!(table.len(), 4);
        assert_eq!(table.columns(), output_columns().as_slice());

        let trust_rows: Vec<&Vec<Cell>> = table
            .rows()
            .iter()
            .filter(|row| row[1] == Cell::Text("R1K".to_string()))
            .collect();
        assert_eq!(trust_rows.len(), 2);
        assert_eq!(
            trust_rows[0][3],
            Cell::Date(NaiveDate::from_ymd_opt(2023, 11, 20).expect("valid date"))
        );
        assert_eq!(trust_rows[0][4..], [Cell::Integer(910), Cell::Integer(10), Cell::Integer(861)]);
        assert_eq!(trust_rows[1][4..], [Cell::Integer(900), Cell::Integer(12), Cell::Integer(850)]);
        assert_eq!(trust_rows[0][2], Cell::Text("London".to_string()));
    }

    #[test]
    fn discards_the_third_data_row_and_empty_groups() {
        let mut data = england_rows();
        data.push(trust(
            "North West",
            "RBT",
            "Mid Cheshire",
            [None, None, None, Some(300.0), Some(2.0), Some(280.0)],
        ));
        let sheet = sitrep_sheet(data);

        let table = transform(&sheet, &SitrepLayout::V1)
            .expect("transform should succeed")
            .table;

        let codes: Vec<&Cell> = table.column_cells(CODE_COLUMN).expect("code column").collect();
        assert!(
            !codes.contains(&&Cell::Text(String::new())),
            "discarded row should not appear"
        );
        let mid_cheshire = codes
            .iter()
            .filter(|code| ***code == Cell::Text("RBT".to_string()))
            .count();
        assert_eq!(mid_cheshire, 1);
    }

    #[test]
    fn partially_empty_group_is_not_coercible() {
        let mut data = england_rows();
        data.push(trust(
            "Midlands",
            "RXK",
            "Sandwell",
            [Some(1.0), None, Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
        ));
        let sheet = sitrep_sheet(data);

        let error = transform(&sheet, &SitrepLayout::V1).expect_err("empty cell should fail");
        assert!(matches!(
            error,
            TransformError::Coercion { record: 3, expected: "integer", .. }
        ));
    }

    #[test]
    fn missing_header_rows_fail() {
        let sheet = Sheet::new("Total G&A beds", vec![vec![text("title")]]);
        let error = transform(&sheet, &SitrepLayout::V1).expect_err("short sheet should fail");
        assert!(matches!(error, TransformError::Sheet { .. }));
    }

    #[test]
    fn out_of_range_date_serial_fails() {
        let mut sheet_rows = vec![vec![]; 13];
        let mut dates = vec![SheetCell::Empty; 5];
        dates.push(num(1e15));
        sheet_rows.push(dates);
        let mut metrics = vec![SheetCell::Empty; 5];
        metrics.push(text(METRIC_COLUMNS[0]));
        sheet_rows.push(metrics);
        let sheet = Sheet::new("Total G&A beds", sheet_rows);

        let error = transform(&sheet, &SitrepLayout::V1).expect_err("huge serial should fail");
        assert!(matches!(error, TransformError::Sheet { .. }));
        assert!(error.to_string().contains("not a date"));
    }

    #[test]
    fn unknown_metric_header_fails() {
        let mut sheet_rows = vec![vec![]; 13];
        let mut dates = vec![SheetCell::Empty; 5];
        dates.push(date(20));
        sheet_rows.push(dates);
        let mut metrics = vec![SheetCell::Empty; 5];
        metrics.push(text("Adult critical care beds"));
        sheet_rows.push(metrics);
        let sheet = Sheet::new("Total G&A beds", sheet_rows);

        let error = transform(&sheet, &SitrepLayout::V1).expect_err("unknown metric should fail");
        assert!(error.to_string().contains("Adult critical care beds"));
    }
}
