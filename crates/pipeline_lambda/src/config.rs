//! Environment configuration, read once per invocation.
//!
//! Every reader takes a lookup closure so tests can supply variables without
//! touching the process environment; `from_env` wires in `std::env::var`.

use std::path::PathBuf;

use pipeline_core::storage_keys::DEFAULT_WAREHOUSE_SCHEMA;

use crate::error::HandlerError;

pub const RDS_SECRET_NAME: &str = "RDS_SECRET_NAME";
pub const RDS_CA_PATH: &str = "RDS_CA_PATH";
pub const WAREHOUSE_SCHEMA: &str = "WAREHOUSE_SCHEMA";
pub const MASTER_SECRET_NAME: &str = "MASTER_SECRET_NAME";
pub const WAREHOUSE_READ_SECRET_NAME: &str = "WAREHOUSE_READ_SECRET_NAME";
pub const WAREHOUSE_WRITE_SECRET_NAME: &str = "WAREHOUSE_WRITE_SECRET_NAME";

const CA_BUNDLE_FILE: &str = "global-bundle.pem";
const LAYER_CA_BUNDLE: &str = "/opt/python/global-bundle.pem";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformLoadConfig {
    pub rds_secret_name: String,
    pub ca_bundle_path: PathBuf,
    pub warehouse_schema: String,
}

impl TransformLoadConfig {
    pub fn from_env() -> Result<Self, HandlerError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HandlerError> {
        Ok(Self {
            rds_secret_name: required(&lookup, RDS_SECRET_NAME)?,
            ca_bundle_path: ca_bundle_path(&lookup),
            warehouse_schema: optional(&lookup, WAREHOUSE_SCHEMA)
                .unwrap_or_else(|| DEFAULT_WAREHOUSE_SCHEMA.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitWarehouseConfig {
    pub master_secret_name: String,
    pub read_secret_name: String,
    pub write_secret_name: String,
    pub ca_bundle_path: PathBuf,
}

impl InitWarehouseConfig {
    pub fn from_env() -> Result<Self, HandlerError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, HandlerError> {
        Ok(Self {
            master_secret_name: required(&lookup, MASTER_SECRET_NAME)?,
            read_secret_name: required(&lookup, WAREHOUSE_READ_SECRET_NAME)?,
            write_secret_name: required(&lookup, WAREHOUSE_WRITE_SECRET_NAME)?,
            ca_bundle_path: ca_bundle_path(&lookup),
        })
    }
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<String, HandlerError> {
    optional(lookup, name).ok_or_else(|| HandlerError::Config(format!("{name} must be configured")))
}

/// RDS certificate bundle: `RDS_CA_PATH`, else the bundle packaged next to the
/// bootstrap binary, else the one shipped in the shared layer.
fn ca_bundle_path(lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(path) = optional(lookup, RDS_CA_PATH) {
        return PathBuf::from(path);
    }
    match optional(lookup, "LAMBDA_TASK_ROOT") {
        Some(root) => PathBuf::from(root).join(CA_BUNDLE_FILE),
        None => PathBuf::from(LAYER_CA_BUNDLE),
    }
}
