use lambda_runtime::Error;
use pipeline_core::Dataset;

#[tokio::main]
async fn main() -> Result<(), Error> {
    pipeline_lambda::runtime::run_transform_load(Dataset::DitTradeBarriers).await
}
