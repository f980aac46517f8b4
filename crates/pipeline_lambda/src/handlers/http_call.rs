use chrono::NaiveDateTime;
use pipeline_core::contract::{parse_http_call_event, RawObjectRef};
use pipeline_core::storage_keys::raw_object_key;
use serde_json::Value;

use crate::adapters::http::HttpSource;
use crate::adapters::object_store::RawObjectStore;
use crate::error::HandlerError;

/// Extract step: download `config.url` and store the body unchanged in the
/// raw bucket, keyed by provider, dataset and extraction time (UTC).
pub fn handle_http_call(
    event: Value,
    now: NaiveDateTime,
    source: &dyn HttpSource,
    store: &dyn RawObjectStore,
) -> Result<RawObjectRef, HandlerError> {
    let event = parse_http_call_event(event)?;
    let config = event.config;

    let body = source.fetch(&config.url).map_err(HandlerError::Fetch)?;
    let raw_key = raw_object_key(
        &config.dataset_provider,
        &config.dataset_name,
        &config.dataset_type,
        now,
    );
    store
        .put_object(&config.raw_bucket, &raw_key, &body)
        .map_err(HandlerError::Store)?;

    tracing::info!(
        component = "http_call",
        event = "raw_object_stored",
        url = %config.url,
        bucket = %config.raw_bucket,
        key = %raw_key,
        bytes = body.len(),
    );

    Ok(RawObjectRef {
        raw_bucket: config.raw_bucket,
        raw_key,
        dataset_provider: config.dataset_provider,
        dataset_name: config.dataset_name,
        dataset_type: None,
    })
}
