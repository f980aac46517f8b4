//! Lambda entry points shared by the pipeline binaries, plus the contract
//! and storage key primitives re-exported as one runtime boundary.

use lambda_runtime::{service_fn, Error, LambdaEvent};
use pipeline_core::contract::TransformLoadResponse;
use pipeline_core::Dataset;
use serde_json::Value;

use crate::adapters::object_store::S3RawObjectStore;
use crate::adapters::secrets::{load_database_secret, SecretsManagerStore};
use crate::adapters::warehouse::PostgresWarehouse;
use crate::config::TransformLoadConfig;
use crate::handlers::transform_load::handle_transform_load;

pub use pipeline_core::{contract, storage_keys};

/// Serves the transform/load step of one dataset until the runtime shuts
/// down.
pub async fn run_transform_load(dataset: Dataset) -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        handle_transform_load_request(dataset, event)
    }))
    .await
}

async fn handle_transform_load_request(
    dataset: Dataset,
    event: LambdaEvent<Value>,
) -> Result<TransformLoadResponse, Error> {
    let config = TransformLoadConfig::from_env()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = S3RawObjectStore::new(aws_sdk_s3::Client::new(&aws_config));
    let secrets = SecretsManagerStore::new(aws_sdk_secretsmanager::Client::new(&aws_config));

    let secret = load_database_secret(&secrets, &config.rds_secret_name)?;
    let warehouse = PostgresWarehouse::new(&secret, &config.ca_bundle_path);

    let response = handle_transform_load(
        event.payload,
        dataset,
        &store,
        &warehouse,
        &config.warehouse_schema,
    )?;
    Ok(response)
}
