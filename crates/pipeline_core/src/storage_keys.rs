use chrono::{NaiveDateTime, Timelike};

pub const DEFAULT_WAREHOUSE_SCHEMA: &str = "dataset";

/// Destination table of one dataset inside the warehouse schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub schema: String,
    pub table: String,
}

impl Destination {
    pub fn for_dataset(schema: &str, dataset_provider: &str, dataset_name: &str) -> Self {
        Self {
            schema: schema.to_string(),
            table: destination_table_name(dataset_provider, dataset_name),
        }
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.table)
    }
}

pub fn destination_table_name(dataset_provider: &str, dataset_name: &str) -> String {
    format!("{dataset_provider}_{dataset_name}").to_lowercase()
}

/// `<provider>/<name>/<name>-<extracted_at>.<type>`, with the extraction time
/// in ISO form (microseconds only when non-zero).
pub fn raw_object_key(
    dataset_provider: &str,
    dataset_name: &str,
    dataset_type: &str,
    extracted_at: NaiveDateTime,
) -> String {
    format!(
        "{dataset_provider}/{dataset_name}/{dataset_name}-{}.{dataset_type}",
        iso_timestamp(extracted_at)
    )
}

fn iso_timestamp(value: NaiveDateTime) -> String {
    let micros = value.nanosecond() / 1_000;
    if micros == 0 {
        value.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        format!("{}.{micros:06}", value.format("%Y-%m-%dT%H:%M:%S"))
    }
}
