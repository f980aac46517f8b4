use pipeline_core::{ContractError, TransformError};
use thiserror::Error;

/// Failure of one pipeline step. Binaries hand it to the Lambda runtime so
/// the orchestrator sees the step as failed.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid event: {0}")]
    InvalidEvent(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("storage failed: {0}")]
    Store(String),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("load failed: {0}")]
    Load(String),
    #[error("secret unavailable: {0}")]
    Secret(String),
    #[error("misconfiguration: {0}")]
    Config(String),
}

impl From<ContractError> for HandlerError {
    fn from(error: ContractError) -> Self {
        match error {
            ContractError::InvalidEvent(message) => Self::InvalidEvent(message),
            ContractError::InvalidSecret(message) => Self::Secret(message),
        }
    }
}
