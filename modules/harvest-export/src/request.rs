use std::path::PathBuf;

use chrono::{DateTime, Utc};
use harvest_common::{CollectionRef, CollectionSetRef};
use serde::Deserialize;

/// The closed set of tabular/line-oriented output formats an export request
/// can name. `Html` and `Xlsx` are accepted on the wire but always resolve to
/// [`crate::error::ExportError::NotYetImplemented`] — see module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    Csv,
    Tsv,
    Html,
    Xlsx,
    Json,
    JsonFull,
    Dehydrate,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Html => "html",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Json | ExportFormat::JsonFull => "json",
            ExportFormat::Dehydrate => "txt",
        }
    }
}

/// An export start message as received from the bus.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportRequest {
    pub id: String,
    pub format: ExportFormat,
    pub segment_size: Option<usize>,
    /// Destination directory; replaced atomically once every segment file
    /// has been written.
    pub path: PathBuf,
    pub collection_set: CollectionSetRef,
    pub collection: CollectionRef,
    #[serde(default)]
    pub seed_ids: Vec<String>,
    #[serde(default)]
    pub harvest_date_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub harvest_date_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_date_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_date_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub item_date_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub item_date_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit_item_types: Option<Vec<String>>,
    #[serde(default)]
    pub dedupe: bool,

    /// Not part of the wire JSON body; populated from the AMQP delivery's
    /// routing key when the message is received.
    #[serde(skip)]
    pub routing_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_deserializes_from_snake_case_wire_names() {
        assert_eq!(
            serde_json::from_str::<ExportFormat>("\"json_full\"").unwrap(),
            ExportFormat::JsonFull
        );
        assert_eq!(
            serde_json::from_str::<ExportFormat>("\"csv\"").unwrap(),
            ExportFormat::Csv
        );
    }

    #[test]
    fn request_round_trips_minimal_fields() {
        let json = serde_json::json!({
            "id": "export:1",
            "format": "csv",
            "segment_size": null,
            "path": "/data/exports/export1",
            "collection_set": {"id": "cs"},
            "collection": {"id": "c"},
        });
        let request: ExportRequest = serde_json::from_value(json).unwrap();
        assert_eq!(request.format, ExportFormat::Csv);
        assert!(request.segment_size.is_none());
        assert!(request.seed_ids.is_empty());
        assert_eq!(request.routing_key, "");
    }
}
