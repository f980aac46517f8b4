//! Department for International Trade market barriers.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::coerce::{records_from_document, require_columns, Record, RecordView};
use crate::datasets::TransformOutput;
use crate::error::TransformError;
use crate::table::{Cell, Column, ColumnType, Table, WarehouseRow};

pub const RECORDS_KEY: &str = "barriers";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

// `trading_bloc` and `categories` must be present but are not loaded.
const REQUIRED_COLUMNS: [&str; 13] = [
    "id",
    "title",
    "summary",
    "trading_bloc",
    "location",
    "categories",
    "is_resolved",
    "caused_by_trading_bloc",
    "status_date",
    "last_published_on",
    "reported_on",
    "country",
    "sectors",
];

#[derive(Debug, Clone, PartialEq)]
pub struct TradeBarrierRow {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub is_resolved: bool,
    pub status_date: Option<NaiveDate>,
    pub country: Option<String>,
    pub caused_by_trading_bloc: bool,
    pub location: Option<String>,
    pub sectors: Vec<String>,
    pub last_published_on: Option<NaiveDateTime>,
    pub reported_on: Option<NaiveDateTime>,
}

impl WarehouseRow for TradeBarrierRow {
    fn columns() -> Vec<Column> {
        vec![
            Column::new("id", ColumnType::Text),
            Column::new("title", ColumnType::Text),
            Column::new("summary", ColumnType::Text),
            Column::new("is_resolved", ColumnType::Boolean),
            Column::new("status_date", ColumnType::Date),
            Column::new("country", ColumnType::Json),
            Column::new("caused_by_trading_bloc", ColumnType::Boolean),
            Column::new("location", ColumnType::Text),
            Column::new("sectors", ColumnType::TextArray),
            Column::new("last_published_on", ColumnType::Timestamp),
            Column::new("reported_on", ColumnType::Timestamp),
        ]
    }

    fn into_cells(self) -> Vec<Cell> {
        vec![
            self.id.into(),
            self.title.into(),
            self.summary.into(),
            Cell::Boolean(self.is_resolved),
            self.status_date.into(),
            self.country.map(Cell::Json).unwrap_or(Cell::Null),
            Cell::Boolean(self.caused_by_trading_bloc),
            self.location.into(),
            Cell::TextArray(self.sectors),
            self.last_published_on.into(),
            self.reported_on.into(),
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

pub fn transform(records: &[Record]) -> Result<Vec<TradeBarrierRow>, TransformError> {
    require_columns(records, &REQUIRED_COLUMNS)?;
    records
        .iter()
        .enumerate()
        .map(|(index, fields)| transform_record(RecordView::new(index, fields)))
        .collect()
}

fn transform_record(record: RecordView<'_>) -> Result<TradeBarrierRow, TransformError> {
    Ok(TradeBarrierRow {
        id: record.text("id")?,
        title: record.text("title")?,
        summary: record.text("summary")?,
        is_resolved: record.boolean("is_resolved"),
        status_date: record.date("status_date")?,
        country: record.json_text("country")?,
        caused_by_trading_bloc: record.boolean("caused_by_trading_bloc"),
        location: record.text("location")?,
        sectors: sector_names(record)?,
        last_published_on: record.timestamp("last_published_on", TIMESTAMP_FORMAT)?,
        reported_on: record.timestamp("reported_on", TIMESTAMP_FORMAT)?,
    })
}

fn sector_names(record: RecordView<'_>) -> Result<Vec<String>, TransformError> {
    let sectors = record.get("sectors");
    let Value::Array(items) = sectors else {
        return Err(record.error("sectors", sectors, "list of sectors"));
    };
    items
        .iter()
        .map(|item| match item.get("name") {
            Some(Value::String(name)) => Ok(name.clone()),
            _ => Err(record.error("sectors", item, "sector with a name")),
        })
        .collect()
}
