use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::msg::Msg;

/// A seed supplied in a harvest start message. Platform harvesters interpret
/// the extra fields beyond `uid`; this crate treats them as opaque JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRef {
    pub uid: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSetRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestRef {
    pub id: String,
    #[serde(rename = "type")]
    pub harvest_type: String,
}

/// A harvest start message as received from the bus. `path` is a persistent
/// directory into which the harvester writes final WARCs and state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub harvest_type: String,
    pub path: String,
    pub collection_set: CollectionSetRef,
    pub collection: CollectionRef,
    #[serde(default)]
    pub seeds: Vec<SeedRef>,

    /// Not part of the wire JSON body; populated from the AMQP delivery's
    /// routing key when the message is received, and re-populated from the
    /// sibling `.routing_key` file when a persisted message is replayed.
    #[serde(skip)]
    pub routing_key: String,
}

/// The closed set of terminal/non-terminal harvester states, serialized using
/// the exact literal strings the wire protocol expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarvestStatus {
    Running,
    Stopping,
    Paused,
    CompletedSuccess,
    CompletedFailure,
}

impl HarvestStatus {
    pub fn as_wire_str(&self) -> &'static str {
        match self {
            HarvestStatus::Running => "running",
            HarvestStatus::Stopping => "stopping",
            HarvestStatus::Paused => "paused",
            HarvestStatus::CompletedSuccess => "completed success",
            HarvestStatus::CompletedFailure => "completed failure",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HarvestStatus::CompletedSuccess | HarvestStatus::CompletedFailure | HarvestStatus::Paused
        )
    }
}

impl Serialize for HarvestStatus {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_wire_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarcCountSummary {
    pub count: usize,
    pub bytes: u64,
}

/// A status message published on `<exchange>/<…status…>`, describing the
/// current or terminal state of a harvest or export.
#[derive(Debug, Clone, Serialize)]
pub struct StatusMessage {
    pub id: String,
    pub status: HarvestStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub infos: Vec<Msg>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<Msg>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Msg>,
    pub date_started: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_ended: Option<DateTime<Utc>>,
    /// Day (`YYYY-MM-DD`) to item-type to count.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub stats: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub token_updates: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub uids: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warcs: Option<WarcCountSummary>,
    pub service: String,
    pub host: String,
    pub instance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarcRef {
    pub id: String,
    pub path: String,
    pub date_created: DateTime<Utc>,
    pub bytes: u64,
    pub sha1: String,
}

/// Published once per finished WARC, after it has been moved into its final
/// dated location and the state store commit for it has landed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarcCreatedMessage {
    pub harvest: HarvestRef,
    pub collection_set: CollectionSetRef,
    pub collection: CollectionRef,
    pub warc: WarcRef,
}

/// Turns a struct/class name like `TwitterHarvester` into the spaced form the
/// wire protocol uses for the `service` field (`"Twitter Harvester"`).
pub fn spaced_service_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if let Some(&next) = chars.peek() {
            if c.is_lowercase() && next.is_uppercase() {
                out.push(' ');
            }
        }
    }
    out
}
