use chrono::Utc;
use lambda_runtime::{service_fn, Error, LambdaEvent};
use pipeline_lambda::adapters::http::ReqwestHttpSource;
use pipeline_lambda::adapters::object_store::S3RawObjectStore;
use pipeline_lambda::handlers::http_call::handle_http_call;
use pipeline_lambda::runtime::contract::RawObjectRef;
use serde_json::Value;

async fn handle_request(event: LambdaEvent<Value>) -> Result<RawObjectRef, Error> {
    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let store = S3RawObjectStore::new(aws_sdk_s3::Client::new(&aws_config));
    let source = ReqwestHttpSource::new(reqwest::Client::new());

    let stored = handle_http_call(event.payload, Utc::now().naive_utc(), &source, &store)?;
    Ok(stored)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    lambda_runtime::tracing::init_default_subscriber();
    lambda_runtime::run(service_fn(handle_request)).await
}
