use lambda_runtime::{service_fn, Error, LambdaEvent};
use pipeline_lambda::adapters::secrets::SecretsManagerStore;
use pipeline_lambda::adapters::warehouse::PostgresWarehouseAdmin;
use pipeline_lambda::config::InitWarehouseConfig;
use pipeline_lambda::handlers::init_warehouse::handle_init_warehouse;
use pipeline_lambda::runtime::contract::InitWarehouseResponse;
use serde_json::Value;

async fn handle_request(_event: LambdaEvent<Value>) -> Result<InitWarehouseResponse, Error> {
    let config = InitWarehouseConfig::from_env()?;

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let secrets = SecretsManagerStore::new(aws_sdk_secretsmanager::Client::new(&aws_config));
    let admin = PostgresWarehouseAdmin::new(config.ca_bundle_path.clone());

    Ok(handle_init_warehouse(&config, &secrets, &admin))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();
    lambda_runtime::run(service_fn(handle_request)).await
}
