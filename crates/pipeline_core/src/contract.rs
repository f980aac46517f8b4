use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ContractError;

/// Settings of one scheduled extract, as configured on the pipeline schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExtractConfig {
    pub url: String,
    pub dataset_provider: String,
    pub dataset_name: String,
    pub dataset_type: String,
    pub raw_bucket: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpCallEvent {
    pub config: ExtractConfig,
}

/// Location of a stored raw payload. Output of the extract step and the
/// `Payload` of every transform/load step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawObjectRef {
    pub raw_bucket: String,
    pub raw_key: String,
    pub dataset_provider: String,
    pub dataset_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransformLoadEvent {
    #[serde(rename = "Payload")]
    pub payload: RawObjectRef,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransformLoadResponse {
    pub rows_processed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitWarehouseResponse {
    pub status_code: u16,
    pub body: String,
}

/// Database credentials as stored in the secrets manager.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct DatabaseSecret {
    pub username: String,
    pub password: String,
    pub host: String,
    #[serde(deserialize_with = "port_from_number_or_string")]
    pub port: u16,
    #[serde(default)]
    pub database: Option<String>,
}

impl fmt::Debug for DatabaseSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSecret")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .finish()
    }
}

impl DatabaseSecret {
    pub fn from_secret_string(secret: &str) -> Result<Self, ContractError> {
        serde_json::from_str(secret).map_err(|error| ContractError::InvalidSecret(error.to_string()))
    }
}

fn port_from_number_or_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let port = match &value {
        Value::Number(number) => number.as_u64().and_then(|port| u16::try_from(port).ok()),
        Value::String(text) => text.trim().parse::<u16>().ok(),
        _ => None,
    };
    port.ok_or_else(|| serde::de::Error::custom(format!("invalid port: {value}")))
}

pub fn parse_http_call_event(event: Value) -> Result<HttpCallEvent, ContractError> {
    let event: HttpCallEvent = serde_json::from_value(event)
        .map_err(|error| ContractError::InvalidEvent(error.to_string()))?;
    let config = &event.config;
    for (field, value) in [
        ("url", &config.url),
        ("datasetProvider", &config.dataset_provider),
        ("datasetName", &config.dataset_name),
        ("datasetType", &config.dataset_type),
        ("rawBucket", &config.raw_bucket),
    ] {
        if value.trim().is_empty() {
            return Err(ContractError::InvalidEvent(format!(
                "config.{field} cannot be empty"
            )));
        }
    }
    Ok(event)
}

pub fn parse_transform_load_event(event: Value) -> Result<TransformLoadEvent, ContractError> {
    let event: TransformLoadEvent = serde_json::from_value(event)
        .map_err(|error| ContractError::InvalidEvent(error.to_string()))?;
    let payload = &event.payload;
    for (field, value) in [
        ("rawBucket", &payload.raw_bucket),
        ("rawKey", &payload.raw_key),
        ("datasetProvider", &payload.dataset_provider),
        ("datasetName", &payload.dataset_name),
    ] {
        if value.trim().is_empty() {
            return Err(ContractError::InvalidEvent(format!(
                "Payload.{field} cannot be empty"
            )));
        }
    }
    Ok(event)
}
