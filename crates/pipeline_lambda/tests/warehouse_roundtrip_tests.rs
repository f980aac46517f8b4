//! Replace-load round trip against a live PostgreSQL.
//!
//! Run with `PIPELINE_TEST_DATABASE_URL=postgres://... cargo test -p
//! pipeline_lambda -- --ignored`. The flood-area test needs PostGIS.

use pipeline_core::storage_keys::Destination;
use pipeline_core::Dataset;
use pipeline_lambda::adapters::warehouse::{quote_identifier, PostgresWarehouse, Warehouse};
use serde_json::{json, Value};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;

const DATABASE_URL: &str = "PIPELINE_TEST_DATABASE_URL";
const SCHEMA: &str = "pipeline_roundtrip";
const BARRIERS_SCHEMA: &str = "pipeline_roundtrip_barriers";
const FLOOD_AREAS_SCHEMA: &str = "pipeline_roundtrip_flood_areas";

async fn prepare_schema(schema: &str) -> (PgConnectOptions, PgConnection) {
    let url = std::env::var(DATABASE_URL).expect("PIPELINE_TEST_DATABASE_URL must be set");
    let options: PgConnectOptions = url.parse().expect("database url should parse");

    let mut connection = PgConnection::connect_with(&options)
        .await
        .expect("database should be reachable");
    sqlx::query(&format!(
        "CREATE SCHEMA IF NOT EXISTS {}",
        quote_identifier(schema)
    ))
    .execute(&mut connection)
    .await
    .expect("schema should be created");
    (options, connection)
}

fn qualified(schema: &str, destination: &Destination) -> String {
    format!(
        "{}.{}",
        quote_identifier(schema),
        quote_identifier(&destination.table)
    )
}

fn flood(id: &str, severity_level: i64) -> Value {
    json!({
        "@id": id,
        "description": "Upper Avon",
        "eaAreaName": "Wessex",
        "eaRegionName": "No longer used",
        "floodArea": {"notation": "112WAFTUBA"},
        "floodAreaID": "112WAFTUBA",
        "isTidal": false,
        "message": "Rising",
        "severity": "Flood alert",
        "severityLevel": severity_level,
        "timeMessageChanged": "2024-01-05T10:23:00",
        "timeRaised": "2024-01-05T10:23:00",
        "timeSeverityChanged": "2024-01-04T18:00:00"
    })
}

fn barrier(id: &str, caused_by_trading_bloc: Value, sectors: Value) -> Value {
    json!({
        "id": id,
        "title": "Import licence for energy equipment",
        "summary": "Licences are required for imports.",
        "is_resolved": false,
        "status_date": "2023-01-01",
        "country": {"iso": "FR", "name": "Côte d’Ivoire"},
        "caused_by_trading_bloc": caused_by_trading_bloc,
        "trading_bloc": null,
        "location": null,
        "sectors": sectors,
        "categories": [],
        "last_published_on": "2023-03-01T10:00:00.123456Z",
        "reported_on": "2022-12-15T08:30:00.000Z"
    })
}

fn flood_area(notation: &str, lat: f64, long: f64) -> Value {
    json!({
        "@id": format!("http://environment.data.gov.uk/flood-monitoring/id/floodAreas/{notation}"),
        "county": "Lancashire",
        "description": "River Ribble at Ribchester",
        "eaAreaName": "Cumbria and Lancashire",
        "floodWatchArea": notation,
        "fwdCode": notation,
        "label": "Ribble at Ribchester",
        "lat": lat,
        "long": long,
        "notation": notation,
        "polygon": null,
        "quickDialNumber": 172112,
        "riverOrSea": "River Ribble"
    })
}

fn dataset_table(dataset: Dataset, key: &str, records: Vec<Value>) -> pipeline_core::Table {
    let document = serde_json::to_vec(&json!({ key: records })).expect("document should serialize");
    dataset
        .transform(&document)
        .expect("transform should succeed")
        .table
}

fn floods_table(items: Vec<Value>) -> pipeline_core::Table {
    dataset_table(Dataset::EaFloods, "items", items)
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires PIPELINE_TEST_DATABASE_URL"]
async fn replace_keeps_only_the_latest_rows() {
    let (options, mut connection) = prepare_schema(SCHEMA).await;

    let warehouse = PostgresWarehouse::from_options(options);
    let destination = Destination::for_dataset(SCHEMA, "EA", "Floods");

    let first = floods_table((0..3).map(|index| flood(&format!("first-{index}"), 1)).collect());
    let written = warehouse
        .replace_table(&destination, &first)
        .expect("first load should succeed");
    assert_eq!(written, 3);

    let second = floods_table(vec![flood("second-0", 2), flood("second-1", 3)]);
    let written = warehouse
        .replace_table(&destination, &second)
        .expect("second load should succeed");
    assert_eq!(written, 2);

    let table = qualified(SCHEMA, &destination);
    let ids: Vec<String> = sqlx::query_scalar(&format!("SELECT \"@id\" FROM {table} ORDER BY 1"))
        .fetch_all(&mut connection)
        .await
        .expect("rows should read back");
    assert_eq!(ids, vec!["second-0".to_string(), "second-1".to_string()]);

    let levels: Vec<i64> =
        sqlx::query_scalar(&format!("SELECT severity_level FROM {table} ORDER BY 1"))
            .fetch_all(&mut connection)
            .await
            .expect("levels should read back");
    assert_eq!(levels, vec![2, 3]);

    sqlx::query(&format!("DROP TABLE {table}"))
        .execute(&mut connection)
        .await
        .expect("cleanup should succeed");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires PIPELINE_TEST_DATABASE_URL"]
async fn trade_barriers_load_json_and_text_arrays() {
    let (options, mut connection) = prepare_schema(BARRIERS_SCHEMA).await;
    let warehouse = PostgresWarehouse::from_options(options);
    let destination = Destination::for_dataset(BARRIERS_SCHEMA, "DIT", "Trade-Barriers");

    let table = dataset_table(
        Dataset::DitTradeBarriers,
        "barriers",
        vec![
            barrier("1", json!(true), json!([{"name": "Energy"}, {"name": "Mining"}])),
            barrier("2", Value::Null, json!([])),
        ],
    );
    let written = warehouse
        .replace_table(&destination, &table)
        .expect("load should succeed");
    assert_eq!(written, 2);

    let target = qualified(BARRIERS_SCHEMA, &destination);
    let rows: Vec<(String, String, Vec<String>, bool, Option<String>)> = sqlx::query_as(&format!(
        "SELECT id, country::text, sectors, caused_by_trading_bloc, location FROM {target} ORDER BY id"
    ))
    .fetch_all(&mut connection)
    .await
    .expect("rows should read back");

    assert_eq!(
        rows,
        vec![
            (
                "1".to_string(),
                r#"{"iso": "FR", "name": "C\u00f4te d\u2019Ivoire"}"#.to_string(),
                vec!["Energy".to_string(), "Mining".to_string()],
                true,
                None,
            ),
            (
                "2".to_string(),
                r#"{"iso": "FR", "name": "C\u00f4te d\u2019Ivoire"}"#.to_string(),
                Vec::new(),
                false,
                None,
            ),
        ]
    );

    sqlx::query(&format!("DROP TABLE {target}"))
        .execute(&mut connection)
        .await
        .expect("cleanup should succeed");
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "requires PIPELINE_TEST_DATABASE_URL with PostGIS"]
async fn flood_areas_load_points_in_wgs84() {
    let (options, mut connection) = prepare_schema(FLOOD_AREAS_SCHEMA).await;
    let warehouse = PostgresWarehouse::from_options(options);
    let destination = Destination::for_dataset(FLOOD_AREAS_SCHEMA, "EA", "Flood-Areas");

    let table = dataset_table(
        Dataset::EaFloodAreas,
        "items",
        vec![
            flood_area("122WAC953", 53.8123, -2.5567),
            flood_area("061WAF23Avon", 51.4, 1.9),
        ],
    );
    let written = warehouse
        .replace_table(&destination, &table)
        .expect("load should succeed");
    assert_eq!(written, 2);

    let target = qualified(FLOOD_AREAS_SCHEMA, &destination);
    let rows: Vec<(String, i64, i64, f64, f64, i32, Option<String>)> = sqlx::query_as(&format!(
        "SELECT notation, lat, long, ST_X(geometry), ST_Y(geometry), ST_SRID(geometry), polygon \
         FROM {target} ORDER BY notation"
    ))
    .fetch_all(&mut connection)
    .await
    .expect("rows should read back");

    assert_eq!(
        rows,
        vec![
            ("061WAF23Avon".to_string(), 51, 1, 1.0, 51.0, 4326, None),
            ("122WAC953".to_string(), 53, -2, -2.0, 53.0, 4326, None),
        ]
    );

    sqlx::query(&format!("DROP TABLE {target}"))
        .execute(&mut connection)
        .await
        .expect("cleanup should succeed");
}
