//! One-off warehouse bootstrap, run as the master user: the `warehouse`
//! database, its `dataset` schema, PostGIS and the write / read-only roles
//! used by the pipeline and its consumers. Every statement is idempotent so
//! the step can be re-run.

use pipeline_core::contract::{DatabaseSecret, InitWarehouseResponse};
use pipeline_core::storage_keys::DEFAULT_WAREHOUSE_SCHEMA;

use crate::adapters::secrets::{load_database_secret, SecretStore};
use crate::adapters::warehouse::{
    quote_identifier, quote_literal, AdminStatement, WarehouseAdmin, WAREHOUSE_DATABASE,
};
use crate::config::InitWarehouseConfig;
use crate::error::HandlerError;

pub const MAINTENANCE_DATABASE: &str = "postgres";

const SUCCESS_BODY: &str = "Schema and user created successfully";
const FAILURE_BODY: &str = "Error creating schema and user";

pub fn handle_init_warehouse(
    config: &InitWarehouseConfig,
    secrets: &dyn SecretStore,
    admin: &dyn WarehouseAdmin,
) -> InitWarehouseResponse {
    match initialise(config, secrets, admin) {
        Ok(()) => {
            tracing::info!(
                component = "init_warehouse",
                event = "warehouse_initialised",
                database = WAREHOUSE_DATABASE,
                schema = DEFAULT_WAREHOUSE_SCHEMA,
            );
            InitWarehouseResponse {
                status_code: 200,
                body: SUCCESS_BODY.to_string(),
            }
        }
        Err(error) => {
            tracing::error!(
                component = "init_warehouse",
                event = "warehouse_init_failed",
                error = %error,
            );
            InitWarehouseResponse {
                status_code: 500,
                body: FAILURE_BODY.to_string(),
            }
        }
    }
}

fn initialise(
    config: &InitWarehouseConfig,
    secrets: &dyn SecretStore,
    admin: &dyn WarehouseAdmin,
) -> Result<(), HandlerError> {
    let master = load_database_secret(secrets, &config.master_secret_name)?;
    let read = load_database_secret(secrets, &config.read_secret_name)?;
    let write = load_database_secret(secrets, &config.write_secret_name)?;

    admin
        .run_statements(&master, MAINTENANCE_DATABASE, &database_statements())
        .map_err(HandlerError::Load)?;
    admin
        .run_statements(
            &master,
            WAREHOUSE_DATABASE,
            &warehouse_statements(&master, &write, &read),
        )
        .map_err(HandlerError::Load)
}

pub fn database_statements() -> Vec<AdminStatement> {
    vec![AdminStatement::unless_exists(
        format!("CREATE DATABASE {}", quote_identifier(WAREHOUSE_DATABASE)),
        format!(
            "SELECT 1 FROM pg_database WHERE datname = {}",
            quote_literal(WAREHOUSE_DATABASE)
        ),
    )]
}

/// Schema, extension, roles and grants inside the warehouse database. The
/// read role is granted select on tables the write role creates later.
pub fn warehouse_statements(
    master: &DatabaseSecret,
    write: &DatabaseSecret,
    read: &DatabaseSecret,
) -> Vec<AdminStatement> {
    let database = quote_identifier(WAREHOUSE_DATABASE);
    let schema = quote_identifier(DEFAULT_WAREHOUSE_SCHEMA);
    let writer = quote_identifier(&write.username);
    let reader = quote_identifier(&read.username);

    let mut statements = vec![
        AdminStatement::always(format!("CREATE SCHEMA IF NOT EXISTS {schema}")),
        AdminStatement::always("CREATE EXTENSION IF NOT EXISTS postgis"),
        // PostGIS lives in `public`, so it stays on the path.
        AdminStatement::always(format!(
            "ALTER DATABASE {database} SET search_path = {schema}, public"
        )),
    ];

    statements.push(create_role(write));
    statements.extend(
        [
            format!("GRANT CONNECT ON DATABASE {database} TO {writer}"),
            format!("GRANT USAGE ON SCHEMA {schema} TO {writer}"),
            format!("GRANT CREATE ON SCHEMA {schema} TO {writer}"),
            format!(
                "ALTER DEFAULT PRIVILEGES IN SCHEMA {schema} GRANT INSERT, UPDATE, DELETE ON TABLES TO {writer}"
            ),
        ]
        .map(AdminStatement::always),
    );

    statements.push(create_role(read));
    statements.extend(
        [
            format!("GRANT CONNECT ON DATABASE {database} TO {reader}"),
            format!("GRANT USAGE ON SCHEMA {schema} TO {reader}"),
            format!("GRANT SELECT ON ALL TABLES IN SCHEMA {schema} TO {reader}"),
            format!(
                "GRANT {writer} TO {}",
                quote_identifier(&master.username)
            ),
            format!(
                "ALTER DEFAULT PRIVILEGES FOR USER {writer} IN SCHEMA {schema} GRANT SELECT ON TABLES TO {reader}"
            ),
        ]
        .map(AdminStatement::always),
    );
    statements
}

fn create_role(role: &DatabaseSecret) -> AdminStatement {
    AdminStatement::unless_exists(
        format!(
            "CREATE USER {} WITH ENCRYPTED PASSWORD {}",
            quote_identifier(&role.username),
            quote_literal(&role.password)
        ),
        format!(
            "SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = {}",
            quote_literal(&role.username)
        ),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;

    struct StaticSecrets(HashMap<String, String>);

    impl SecretStore for StaticSecrets {
        fn secret_string(&self, name: &str) -> Result<String, String> {
            self.0
                .get(name)
                .cloned()
                .ok_or_else(|| format!("secret '{name}' not found"))
        }
    }

    #[derive(Default)]
    struct RecordingAdmin {
        runs: Mutex<Vec<(String, String, Vec<AdminStatement>)>>,
        fail_on_database: Option<&'static str>,
    }

    impl RecordingAdmin {
        fn runs(&self) -> Vec<(String, String, Vec<AdminStatement>)> {
            self.runs.lock().expect("poisoned mutex").clone()
        }
    }

    impl WarehouseAdmin for RecordingAdmin {
        fn run_statements(
            &self,
            credentials: &DatabaseSecret,
            database: &str,
            statements: &[AdminStatement],
        ) -> Result<(), String> {
            if self.fail_on_database == Some(database) {
                return Err(format!("could not connect to {database}"));
            }
            self.runs.lock().expect("poisoned mutex").push((
                credentials.username.clone(),
                database.to_string(),
                statements.to_vec(),
            ));
            Ok(())
        }
    }

    fn secret(username: &str, password: &str) -> String {
        serde_json::json!({
            "username": username,
            "password": password,
            "host": "warehouse.cluster.internal",
            "port": 5432
        })
        .to_string()
    }

    fn config() -> InitWarehouseConfig {
        InitWarehouseConfig {
            master_secret_name: "master".to_string(),
            read_secret_name: "read".to_string(),
            write_secret_name: "write".to_string(),
            ca_bundle_path: PathBuf::from("/var/task/global-bundle.pem"),
        }
    }

    fn secrets() -> StaticSecrets {
        StaticSecrets(HashMap::from([
            ("master".to_string(), secret("postgres_admin", "m")),
            ("read".to_string(), secret("warehouse_read", "r")),
            ("write".to_string(), secret("warehouse_write", "it's-w")),
        ]))
    }

    #[test]
    fn creates_database_then_configures_it_as_master() {
        let admin = RecordingAdmin::default();

        let response = handle_init_warehouse(&config(), &secrets(), &admin);

        assert_eq!(
            response,
            InitWarehouseResponse {
                status_code: 200,
                body: SUCCESS_BODY.to_string(),
            }
        );
        let runs = admin.runs();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].0, "postgres_admin");
        assert_eq!(runs[0].1, "postgres");
        assert_eq!(runs[0].2, database_statements());
        assert_eq!(runs[1].0, "postgres_admin");
        assert_eq!(runs[1].1, "warehouse");
    }

    #[test]
    fn role_creation_is_guarded_and_passwords_are_quoted() {
        let statements = warehouse_statements(
            &DatabaseSecret::from_secret_string(&secret("postgres_admin", "m")).expect("master"),
            &DatabaseSecret::from_secret_string(&secret("warehouse_write", "it's-w"))
                .expect("write"),
            &DatabaseSecret::from_secret_string(&secret("warehouse_read", "r")).expect("read"),
        );

        let create_writer = statements
            .iter()
            .find(|statement| statement.statement.starts_with("CREATE USER \"warehouse_write\""))
            .expect("writer creation");
        assert_eq!(
            create_writer.statement,
            "CREATE USER \"warehouse_write\" WITH ENCRYPTED PASSWORD 'it''s-w'"
        );
        assert_eq!(
            create_writer.unless_exists.as_deref(),
            Some("SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = 'warehouse_write'")
        );

        let texts: Vec<&str> = statements
            .iter()
            .map(|statement| statement.statement.as_str())
            .collect();
        assert!(texts.contains(&"CREATE EXTENSION IF NOT EXISTS postgis"));
        assert!(texts.contains(&"GRANT \"warehouse_write\" TO \"postgres_admin\""));
        assert_eq!(
            texts.last(),
            Some(
                &"ALTER DEFAULT PRIVILEGES FOR USER \"warehouse_write\" IN SCHEMA \"dataset\" GRANT SELECT ON TABLES TO \"warehouse_read\""
            )
        );
    }

    #[test]
    fn failure_returns_500_without_leaking_details() {
        let admin = RecordingAdmin {
            fail_on_database: Some("warehouse"),
            ..RecordingAdmin::default()
        };

        let response = handle_init_warehouse(&config(), &secrets(), &admin);

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, FAILURE_BODY);
        assert_eq!(admin.runs().len(), 1);
    }

    #[test]
    fn missing_secret_returns_500_before_connecting() {
        let admin = RecordingAdmin::default();
        let secrets = StaticSecrets(HashMap::new());

        let response = handle_init_warehouse(&config(), &secrets, &admin);

        assert_eq!(response.status_code, 500);
        assert!(admin.runs().is_empty());
    }
}
