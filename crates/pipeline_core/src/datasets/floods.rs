//! Environment Agency flood warnings currently in force.

use chrono::NaiveDateTime;

use crate::coerce::{records_from_document, require_columns, Record, RecordView};
use crate::datasets::TransformOutput;
use crate::error::TransformError;
use crate::naming::camel_to_snake;
use crate::table::{Cell, Column, ColumnType, Table, WarehouseRow};

pub const RECORDS_KEY: &str = "items";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const DROPPED_COLUMNS: [&str; 2] = ["eaRegionName", "floodArea"];

// Source names, in output order.
const OUTPUT_COLUMNS: [(&str, ColumnType); 11] = [
    ("@id", ColumnType::Text),
    ("description", ColumnType::Text),
    ("eaAreaName", ColumnType::Text),
    ("floodAreaID", ColumnType::Text),
    ("isTidal", ColumnType::Boolean),
    ("message", ColumnType::Text),
    ("severity", ColumnType::Text),
    ("severityLevel", ColumnType::Integer),
    ("timeMessageChanged", ColumnType::Timestamp),
    ("timeRaised", ColumnType::Timestamp),
    ("timeSeverityChanged", ColumnType::Timestamp),
];

#[derive(Debug, Clone, PartialEq)]
pub struct FloodRow {
    pub id: Option<String>,
    pub description: String,
    pub ea_area_name: Option<String>,
    pub flood_area_id: Option<String>,
    pub is_tidal: bool,
    pub message: String,
    pub severity: Option<String>,
    pub severity_level: i64,
    pub time_message_changed: Option<NaiveDateTime>,
    pub time_raised: Option<NaiveDateTime>,
    pub time_severity_changed: Option<NaiveDateTime>,
}

impl WarehouseRow for FloodRow {
    fn columns() -> Vec<Column> {
        OUTPUT_COLUMNS
            .iter()
            .map(|(name, column_type)| Column::new(camel_to_snake(name), *column_type))
            .collect()
    }

    fn into_cells(self) -> Vec<Cell> {
        vec![
            self.id.into(),
            Cell::Text(self.description),
            self.ea_area_name.into(),
            self.flood_area_id.into(),
            Cell::Boolean(self.is_tidal),
            Cell::Text(self.message),
            self.severity.into(),
            Cell::Integer(self.severity_level),
            self.time_message_changed.into(),
            self.time_raised.into(),
            self.time_severity_changed.into(),
        ]
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

pub fn transform(records: &[Record]) -> Result<Vec<FloodRow>, TransformError> {
    let required: Vec<&str> = DROPPED_COLUMNS
        .iter()
        .copied()
        .chain(OUTPUT_COLUMNS.iter().map(|(name, _)| *name))
        .collect();
    require_columns(records, &required)?;

    records
        .iter()
        .enumerate()
        .map(|(index, fields)| transform_record(RecordView::new(index, fields)))
        .collect()
}

fn transform_record(record: RecordView<'_>) -> Result<FloodRow, TransformError> {
    Ok(FloodRow {
        id: record.text("@id")?,
        description: record.required_text("description")?.trim().to_string(),
        ea_area_name: record.text("eaAreaName")?,
        flood_area_id: record.text("floodAreaID")?,
        is_tidal: record.boolean("isTidal"),
        message: record.required_text("message")?.trim().to_string(),
        severity: record.text("severity")?,
        severity_level: record.integer("severityLevel")?,
        time_message_changed: record.timestamp("timeMessageChanged", TIMESTAMP_FORMAT)?,
        time_raised: record.timestamp("timeRaised", TIMESTAMP_FORMAT)?,
        time_severity_changed: record.timestamp("timeSeverityChanged", TIMESTAMP_FORMAT)?,
    })
}
