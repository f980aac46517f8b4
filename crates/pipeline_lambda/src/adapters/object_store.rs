use std::error::Error as StdError;

use aws_credential_types::provider::error::CredentialsError;
use aws_sdk_s3::primitives::ByteStream;

pub const MISSING_CREDENTIALS_MESSAGE: &str = "Credentials not available for AWS S3";

/// Raw payload storage, addressed by bucket and key.
pub trait RawObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String>;
    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String>;
}

#[derive(Debug, Clone)]
pub struct S3RawObjectStore {
    s3_client: aws_sdk_s3::Client,
}

impl S3RawObjectStore {
    pub fn new(s3_client: aws_sdk_s3::Client) -> Self {
        Self { s3_client }
    }
}

impl RawObjectStore for S3RawObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, String> {
        let bucket = bucket.to_string();
        let object_key = key.to_string();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_object()
                    .bucket(&bucket)
                    .key(&object_key)
                    .send()
                    .await
                    .map_err(|error| {
                        format!("failed to read s3://{bucket}/{object_key}: {error}")
                    })?;
                let body = output.body.collect().await.map_err(|error| {
                    format!("failed to read body of s3://{bucket}/{object_key}: {error}")
                })?;
                Ok::<_, String>(body.into_bytes().to_vec())
            })
        })
    }

    fn put_object(&self, bucket: &str, key: &str, body: &[u8]) -> Result<(), String> {
        let bucket = bucket.to_string();
        let object_key = key.to_string();
        let body_bytes = body.to_vec();
        let client = self.s3_client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .put_object()
                    .bucket(&bucket)
                    .key(&object_key)
                    .body(ByteStream::from(body_bytes))
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| {
                        let message = upload_error_message(&error, &bucket, &object_key);
                        tracing::error!(
                            component = "object_store",
                            event = "put_object_failed",
                            bucket = %bucket,
                            key = %object_key,
                            error = %message,
                        );
                        message
                    })
            })
        })
    }
}

/// Missing credentials get their own message; anything else is reported
/// with the object location.
pub fn upload_error_message(error: &(dyn StdError + 'static), bucket: &str, key: &str) -> String {
    if is_missing_credentials(error) {
        MISSING_CREDENTIALS_MESSAGE.to_string()
    } else {
        format!(
            "failed to write object to s3://{bucket}/{key}: {}",
            error_chain(error)
        )
    }
}

fn is_missing_credentials(error: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(error);
    while let Some(error) = current {
        if matches!(
            error.downcast_ref::<CredentialsError>(),
            Some(CredentialsError::CredentialsNotLoaded(_))
        ) {
            return true;
        }
        current = error.source();
    }
    false
}

fn error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        message.push_str(": ");
        message.push_str(&source.to_string());
        current = source.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    #[derive(Debug)]
    struct DispatchFailure {
        source: Box<dyn StdError + Send + Sync>,
    }

    impl fmt::Display for DispatchFailure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "dispatch failure")
        }
    }

    impl StdError for DispatchFailure {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(self.source.as_ref())
        }
    }

    #[test]
    fn missing_credentials_anywhere_in_chain_get_distinct_message() {
        let error = DispatchFailure {
            source: Box::new(CredentialsError::not_loaded("no providers in chain")),
        };

        assert_eq!(
            upload_error_message(&error, "raw-data", "ea/floods/floods.json"),
            MISSING_CREDENTIALS_MESSAGE
        );
    }

    #[test]
    fn other_failures_keep_location_and_cause() {
        let error = DispatchFailure {
            source: "connection reset".into(),
        };

        let message = upload_error_message(&error, "raw-data", "ea/floods/floods.json");
        assert_eq!(
            message,
            "failed to write object to s3://raw-data/ea/floods/floods.json: dispatch failure: connection reset"
        );
    }
}
