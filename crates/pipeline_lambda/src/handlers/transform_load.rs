use std::time::Instant;

use pipeline_core::contract::{parse_transform_load_event, TransformLoadResponse};
use pipeline_core::storage_keys::Destination;
use pipeline_core::Dataset;
use serde_json::Value;

use crate::adapters::object_store::RawObjectStore;
use crate::adapters::warehouse::Warehouse;
use crate::error::HandlerError;

/// Transform/load step: read the raw object named by `Payload`, apply the
/// dataset's transform and replace its warehouse table. Nothing is written
/// when the transform fails.
pub fn handle_transform_load(
    event: Value,
    dataset: Dataset,
    store: &dyn RawObjectStore,
    warehouse: &dyn Warehouse,
    warehouse_schema: &str,
) -> Result<TransformLoadResponse, HandlerError> {
    let started = Instant::now();
    let event = parse_transform_load_event(event)?;
    let raw = event.payload;

    let document = store
        .get_object(&raw.raw_bucket, &raw.raw_key)
        .map_err(HandlerError::Fetch)?;

    let output = dataset.transform(&document).map_err(|error| {
        tracing::error!(
            component = "transform_load",
            event = "transform_failed",
            dataset = dataset.as_str(),
            key = %raw.raw_key,
            error = %error,
        );
        HandlerError::Transform(error)
    })?;

    let destination =
        Destination::for_dataset(warehouse_schema, &raw.dataset_provider, &raw.dataset_name);
    let rows_written = warehouse
        .replace_table(&destination, &output.table)
        .map_err(HandlerError::Load)?;

    tracing::info!(
        component = "transform_load",
        event = "table_replaced",
        dataset = dataset.as_str(),
        destination = %destination.qualified_name(),
        records_read = output.records_read,
        rows_written,
        elapsed_ms = started.elapsed().as_millis() as u64,
    );

    Ok(TransformLoadResponse {
        rows_processed: output.records_read,
    })
}
