//! Relational warehouse (PostgreSQL with PostGIS) adapters.
//!
//! The SQL text is built by pure functions so it can be checked without a
//! database; the sqlx implementations only bind values and execute.

use std::path::{Path, PathBuf};

use pipeline_core::contract::DatabaseSecret;
use pipeline_core::storage_keys::Destination;
use pipeline_core::{Cell, Column, ColumnType, Table};
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};
use sqlx::query_builder::Separated;
use sqlx::{Connection, Postgres, QueryBuilder};

/// Bind parameters allowed in one Postgres statement.
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// Database created by warehouse initialisation and used when a secret does
/// not name one.
pub const WAREHOUSE_DATABASE: &str = "warehouse";

pub const POINT_SRID: u32 = 4326;

/// Replace-load target. `replace_table` drops and recreates the destination
/// and returns the number of rows written.
pub trait Warehouse {
    fn replace_table(&self, destination: &Destination, table: &Table) -> Result<u64, String>;
}

/// One administrative statement, optionally skipped when `unless_exists`
/// returns a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminStatement {
    pub statement: String,
    pub unless_exists: Option<String>,
}

impl AdminStatement {
    pub fn always(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            unless_exists: None,
        }
    }

    pub fn unless_exists(statement: impl Into<String>, probe: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            unless_exists: Some(probe.into()),
        }
    }
}

/// Runs administrative statements in order, outside any transaction, on a
/// named database as the given user.
pub trait WarehouseAdmin {
    fn run_statements(
        &self,
        credentials: &DatabaseSecret,
        database: &str,
        statements: &[AdminStatement],
    ) -> Result<(), String>;
}

/// TLS `verify-ca` connection options against the RDS certificate bundle.
pub fn connect_options(
    secret: &DatabaseSecret,
    database: &str,
    ca_bundle_path: &Path,
) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&secret.host)
        .port(secret.port)
        .username(&secret.username)
        .password(&secret.password)
        .database(database)
        .ssl_mode(PgSslMode::VerifyCa)
        .ssl_root_cert(ca_bundle_path)
}

#[derive(Debug, Clone)]
pub struct PostgresWarehouse {
    options: PgConnectOptions,
}

impl PostgresWarehouse {
    pub fn new(secret: &DatabaseSecret, ca_bundle_path: &Path) -> Self {
        let database = secret.database.as_deref().unwrap_or(WAREHOUSE_DATABASE);
        Self::from_options(connect_options(secret, database, ca_bundle_path))
    }

    pub fn from_options(options: PgConnectOptions) -> Self {
        Self { options }
    }

    async fn replace(&self, destination: &Destination, table: &Table) -> Result<u64, sqlx::Error> {
        let mut connection = connect(&self.options).await?;
        let mut transaction = connection.begin().await?;

        sqlx::query(&drop_table_sql(destination))
            .execute(&mut *transaction)
            .await?;
        sqlx::query(&create_table_sql(destination, table.columns()))
            .execute(&mut *transaction)
            .await?;

        let mut rows_written = 0u64;
        let rows_per_statement = rows_per_insert(table.columns());
        for chunk in table.rows().chunks(rows_per_statement) {
            let mut insert = insert_statement(destination, table.columns(), chunk);
            rows_written += insert
                .build()
                .execute(&mut *transaction)
                .await?
                .rows_affected();
        }

        transaction.commit().await?;
        connection.close().await?;
        Ok(rows_written)
    }
}

impl Warehouse for PostgresWarehouse {
    fn replace_table(&self, destination: &Destination, table: &Table) -> Result<u64, String> {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                self.replace(destination, table).await.map_err(|error| {
                    format!(
                        "failed to replace {}: {error}",
                        destination.qualified_name()
                    )
                })
            })
        })
    }
}

#[derive(Debug, Clone)]
pub struct PostgresWarehouseAdmin {
    ca_bundle_path: PathBuf,
}

impl PostgresWarehouseAdmin {
    pub fn new(ca_bundle_path: impl Into<PathBuf>) -> Self {
        Self {
            ca_bundle_path: ca_bundle_path.into(),
        }
    }

    async fn run(
        &self,
        credentials: &DatabaseSecret,
        database: &str,
        statements: &[AdminStatement],
    ) -> Result<(), sqlx::Error> {
        let options = connect_options(credentials, database, &self.ca_bundle_path);
        let mut connection = connect(&options).await?;
        for admin in statements {
            if let Some(probe) = &admin.unless_exists {
                let existing = sqlx::query(probe).fetch_optional(&mut connection).await?;
                if existing.is_some() {
                    continue;
                }
            }
            sqlx::query(&admin.statement).execute(&mut connection).await?;
        }
        connection.close().await
    }
}

impl WarehouseAdmin for PostgresWarehouseAdmin {
    fn run_statements(
        &self,
        credentials: &DatabaseSecret,
        database: &str,
        statements: &[AdminStatement],
    ) -> Result<(), String> {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                self.run(credentials, database, statements)
                    .await
                    .map_err(|error| format!("administration of database '{database}' failed: {error}"))
            })
        })
    }
}

async fn connect(options: &PgConnectOptions) -> Result<PgConnection, sqlx::Error> {
    PgConnection::connect_with(options).await
}

/// Multi-row `INSERT` for `rows`, binding every non-null cell.
pub fn insert_statement(
    destination: &Destination,
    columns: &[Column],
    rows: &[Vec<Cell>],
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::<Postgres>::new(insert_prefix_sql(destination, columns));
    builder.push_values(rows, |mut values, cells| {
        for cell in cells {
            push_cell(&mut values, cell);
        }
    });
    builder
}

fn push_cell(values: &mut Separated<'_, '_, Postgres, &'static str>, cell: &Cell) {
    match cell {
        Cell::Null => {
            values.push("NULL");
        }
        Cell::Text(text) => {
            values.push_bind(text.clone());
        }
        Cell::Boolean(value) => {
            values.push_bind(*value);
        }
        Cell::Date(value) => {
            values.push_bind(*value);
        }
        Cell::Timestamp(value) => {
            values.push_bind(*value);
        }
        Cell::Integer(value) => {
            values.push_bind(*value);
        }
        Cell::Json(text) => {
            values.push_bind(text.clone());
            values.push_unseparated("::json");
        }
        Cell::TextArray(items) => {
            values.push_bind(items.clone());
        }
        Cell::Point { lon, lat } => {
            values.push("ST_SetSRID(ST_MakePoint(");
            values.push_bind_unseparated(*lon);
            values.push_unseparated(", ");
            values.push_bind_unseparated(*lat);
            values.push_unseparated(format!("), {POINT_SRID})"));
        }
    }
}

pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub fn qualified_table(destination: &Destination) -> String {
    format!(
        "{}.{}",
        quote_identifier(&destination.schema),
        quote_identifier(&destination.table)
    )
}

pub fn sql_type(column_type: ColumnType) -> String {
    match column_type {
        ColumnType::Text => "TEXT".to_string(),
        ColumnType::Boolean => "BOOLEAN".to_string(),
        ColumnType::Date => "DATE".to_string(),
        ColumnType::Timestamp => "TIMESTAMP".to_string(),
        ColumnType::Integer => "BIGINT".to_string(),
        ColumnType::Json => "JSON".to_string(),
        ColumnType::TextArray => "TEXT[]".to_string(),
        ColumnType::Point => format!("geometry(Point, {POINT_SRID})"),
    }
}

pub fn drop_table_sql(destination: &Destination) -> String {
    format!("DROP TABLE IF EXISTS {}", qualified_table(destination))
}

pub fn create_table_sql(destination: &Destination, columns: &[Column]) -> String {
    let definitions: Vec<String> = columns
        .iter()
        .map(|column| {
            format!(
                "{} {}",
                quote_identifier(&column.name),
                sql_type(column.column_type)
            )
        })
        .collect();
    format!(
        "CREATE TABLE {} ({})",
        qualified_table(destination),
        definitions.join(", ")
    )
}

pub fn insert_prefix_sql(destination: &Destination, columns: &[Column]) -> String {
    let names: Vec<String> = columns
        .iter()
        .map(|column| quote_identifier(&column.name))
        .collect();
    format!(
        "INSERT INTO {} ({}) ",
        qualified_table(destination),
        names.join(", ")
    )
}

fn bind_parameters(column_type: ColumnType) -> usize {
    match column_type {
        ColumnType::Point => 2,
        _ => 1,
    }
}

/// Rows per multi-row `INSERT` so that a statement never exceeds the bind
/// parameter limit, counting the worst case where no cell is null.
pub fn rows_per_insert(columns: &[Column]) -> usize {
    let per_row: usize = columns
        .iter()
        .map(|column| bind_parameters(column.column_type))
        .sum();
    (MAX_BIND_PARAMETERS / per_row.max(1)).max(1)
}
