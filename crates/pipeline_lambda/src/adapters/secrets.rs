use pipeline_core::contract::DatabaseSecret;

use crate::error::HandlerError;

/// Named secret strings, fetched fresh on every call.
pub trait SecretStore {
    fn secret_string(&self, name: &str) -> Result<String, String>;
}

#[derive(Debug, Clone)]
pub struct SecretsManagerStore {
    client: aws_sdk_secretsmanager::Client,
}

impl SecretsManagerStore {
    pub fn new(client: aws_sdk_secretsmanager::Client) -> Self {
        Self { client }
    }
}

impl SecretStore for SecretsManagerStore {
    fn secret_string(&self, name: &str) -> Result<String, String> {
        let secret_id = name.to_string();
        let client = self.client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let output = client
                    .get_secret_value()
                    .secret_id(&secret_id)
                    .send()
                    .await
                    .map_err(|error| format!("failed to read secret '{secret_id}': {error}"))?;
                output
                    .secret_string()
                    .map(str::to_string)
                    .ok_or_else(|| format!("secret '{secret_id}' has no string value"))
            })
        })
    }
}

pub fn load_database_secret(
    secrets: &dyn SecretStore,
    name: &str,
) -> Result<DatabaseSecret, HandlerError> {
    let raw = secrets.secret_string(name).map_err(HandlerError::Secret)?;
    DatabaseSecret::from_secret_string(&raw)
        .map_err(|error| HandlerError::Secret(format!("'{name}': {error}")))
}
