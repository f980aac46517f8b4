//! Environment Agency flood alert and warning areas.

use crate::coerce::{records_from_document, require_columns, Record, RecordView};
use crate::datasets::TransformOutput;
use crate::error::TransformError;
use crate::naming::camel_to_snake;
use crate::table::{Cell, Column, ColumnType, Table, WarehouseRow};

pub const RECORDS_KEY: &str = "items";
pub const GEOMETRY_COLUMN: &str = "geometry";

const TEXT_COLUMNS: [&str; 11] = [
    "@id",
    "county",
    "description",
    "eaAreaName",
    "floodWatchArea",
    "fwdCode",
    "label",
    "notation",
    "polygon",
    "quickDialNumber",
    "riverOrSea",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FloodAreaRow {
    /// Values of `TEXT_COLUMNS`, same order.
    pub text: Vec<Option<String>>,
    pub lat: i64,
    pub long: i64,
    pub geometry: Point,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl WarehouseRow for FloodAreaRow {
    fn columns() -> Vec<Column> {
        let mut columns: Vec<Column> = TEXT_COLUMNS
            .iter()
            .map(|name| Column::new(camel_to_snake(name), ColumnType::Text))
            .collect();
        columns.push(Column::new("lat", ColumnType::Integer));
        columns.push(Column::new("long", ColumnType::Integer));
        columns.push(Column::new(GEOMETRY_COLUMN, ColumnType::Point));
        columns
    }

    fn into_cells(self) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self.text.into_iter().map(Cell::from).collect();
        cells.push(Cell::Integer(self.lat));
        cells.push(Cell::Integer(self.long));
        cells.push(Cell::Point {
            lon: self.geometry.lon,
            lat: self.geometry.lat,
        });
        cells
    }
}

pub fn transform_document(document: &[u8]) -> Result<TransformOutput, TransformError> {
    let records = records_from_document(document, RECORDS_KEY)?;
    let rows = transform(&records)?;
    Ok(TransformOutput {
        records_read: records.len(),
        table: Table::from_rows(rows)?,
    })
}

pub fn transform(records: &[Record]) -> Result<Vec<FloodAreaRow>, TransformError> {
    let required: Vec<&str> = TEXT_COLUMNS
        .iter()
        .copied()
        .chain(["lat", "long"])
        .collect();
    require_columns(records, &required)?;

    records
        .iter()
        .enumerate()
        .map(|(index, fields)| transform_record(RecordView::new(index, fields)))
        .collect()
}

fn transform_record(record: RecordView<'_>) -> Result<FloodAreaRow, TransformError> {
    let text = TEXT_COLUMNS
        .iter()
        .map(|column| record.text(column))
        .collect::<Result<Vec<_>, _>>()?;

    let lat = record.integer("lat")?;
    let long = record.integer("long")?;

    // The point sits at the stored integer coordinates.
    Ok(FloodAreaRow {
        text,
        lat,
        long,
        geometry: Point {
            lon: long as f64,
            lat: lat as f64,
        },
    })
}
