use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("invalid database secret: {0}")]
    InvalidSecret(String),
}

/// Failure of a dataset transform. Raised before anything is written.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransformError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("expected column '{column}' is absent from the payload")]
    MissingColumn { column: String },
    #[error("record {record}: column '{column}' value {value} is not coercible to {expected}")]
    Coercion {
        record: usize,
        column: String,
        value: String,
        expected: &'static str,
    },
    #[error("row {row} has {actual} cells, table has {expected} columns")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("row {row}: cell for column '{column}' does not match type {expected}")]
    CellType {
        row: usize,
        column: String,
        expected: &'static str,
    },
    #[error("sheet '{sheet}': {message}")]
    Sheet { sheet: String, message: String },
}

impl TransformError {
    pub fn coercion(
        record: usize,
        column: &str,
        value: impl ToString,
        expected: &'static str,
    ) -> Self {
        Self::Coercion {
            record,
            column: column.to_string(),
            value: value.to_string(),
            expected,
        }
    }

    pub fn missing_column(column: &str) -> Self {
        Self::MissingColumn {
            column: column.to_string(),
        }
    }
}
