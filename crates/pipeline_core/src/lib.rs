//! Domain primitives of the dataset pipelines.
//!
//! This crate owns event contracts, raw object key and destination naming,
//! and the per-dataset transforms from raw payload to typed table. It
//! excludes AWS SDK, HTTP and database concerns, which live in
//! `pipeline_lambda`.

pub mod coerce;
pub mod contract;
pub mod datasets;
pub mod error;
pub mod naming;
pub mod sheet;
pub mod storage_keys;
pub mod table;

pub use datasets::{Dataset, TransformOutput};
pub use error::{ContractError, TransformError};
pub use table::{Cell, Column, ColumnType, Table};
