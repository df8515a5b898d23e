use chrono::{DateTime, Utc};
use serde_json::Value;

/// One extracted item, yielded from a single WARC response record by a
/// [`WarcRecordHandler::item_iter`] call.
#[derive(Debug, Clone)]
pub struct IterItem {
    pub item_type: String,
    pub item_id: String,
    pub item_date: DateTime<Utc>,
    pub url: String,
    pub item: Value,
}

/// Platform-specific extension point for turning WARC response bodies back
/// into the items a platform harvester originally captured. No concrete
/// implementation ships in this crate — platform harvesters own it.
pub trait WarcRecordHandler: Send + Sync {
    /// Whether a record whose target URI is `url` should be handed to
    /// `item_iter` at all (e.g. only API endpoints, not media downloads).
    fn select_record(&self, url: &str) -> bool;

    /// Parse a selected record's (already dechunked) body into zero or more
    /// items.
    fn item_iter(&self, url: &str, parsed_body: &[u8]) -> Vec<IterItem>;

    /// The full set of item type names this handler can ever produce, used
    /// to validate `limit_item_types` filters up front.
    fn item_types(&self) -> Vec<String>;

    /// Whether `parsed_body` should be treated as newline-delimited records
    /// rather than a single JSON document before being handed to
    /// `item_iter` — the iterator itself does not split lines, this only
    /// documents the handler's expectation for callers that pre-process.
    fn line_oriented(&self) -> bool;
}
