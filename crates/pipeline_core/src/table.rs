//! Typed, in-memory table handed from a dataset transform to the warehouse.

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::TransformError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    Boolean,
    Date,
    Timestamp,
    Integer,
    /// JSON document stored as its serialised text.
    Json,
    TextArray,
    /// WGS84 (EPSG:4326) point.
    Point,
}

impl ColumnType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Timestamp => "timestamp",
            Self::Integer => "integer",
            Self::Json => "json",
            Self::TextArray => "text array",
            Self::Point => "point",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Integer(i64),
    Json(String),
    TextArray(Vec<String>),
    Point { lon: f64, lat: f64 },
}

impl Cell {
    fn matches(&self, column_type: ColumnType) -> bool {
        matches!(
            (self, column_type),
            (Self::Null, _)
                | (Self::Text(_), ColumnType::Text)
                | (Self::Boolean(_), ColumnType::Boolean)
                | (Self::Date(_), ColumnType::Date)
                | (Self::Timestamp(_), ColumnType::Timestamp)
                | (Self::Integer(_), ColumnType::Integer)
                | (Self::Json(_), ColumnType::Json)
                | (Self::TextArray(_), ColumnType::TextArray)
                | (Self::Point { .. }, ColumnType::Point)
        )
    }
}

impl From<Option<String>> for Cell {
    fn from(value: Option<String>) -> Self {
        value.map(Cell::Text).unwrap_or(Cell::Null)
    }
}

impl From<Option<NaiveDate>> for Cell {
    fn from(value: Option<NaiveDate>) -> Self {
        value.map(Cell::Date).unwrap_or(Cell::Null)
    }
}

impl From<Option<NaiveDateTime>> for Cell {
    fn from(value: Option<NaiveDateTime>) -> Self {
        value.map(Cell::Timestamp).unwrap_or(Cell::Null)
    }
}

/// A dataset's output row: declares its columns and turns itself into cells
/// in the same order.
pub trait WarehouseRow {
    fn columns() -> Vec<Column>;
    fn into_cells(self) -> Vec<Cell>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows<R: WarehouseRow>(rows: Vec<R>) -> Result<Self, TransformError> {
        let mut table = Self::new(R::columns());
        table.rows.reserve(rows.len());
        for row in rows {
            table.push_row(row.into_cells())?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, cells: Vec<Cell>) -> Result<(), TransformError> {
        let row = self.rows.len();
        if cells.len() != self.columns.len() {
            return Err(TransformError::RowWidth {
                row,
                expected: self.columns.len(),
                actual: cells.len(),
            });
        }
        for (cell, column) in cells.iter().zip(&self.columns) {
            if !cell.matches(column.column_type) {
                return Err(TransformError::CellType {
                    row,
                    column: column.name.clone(),
                    expected: column.column_type.as_str(),
                });
            }
        }
        self.rows.push(cells);
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Cells of one named column, top to bottom.
    pub fn column_cells<'a>(&'a self, name: &str) -> Option<impl Iterator<Item = &'a Cell> + 'a> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[index]))
    }
}
