use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use warc::{RecordType, WarcHeader, WarcReader};

use crate::error::{Result, WarcError};
use crate::handler::{IterItem, WarcRecordHandler};
use crate::http_body::extract_http_body;

/// Filters applied after a handler has already parsed items out of a
/// record, mirroring the knobs exposed to exporter callers.
#[derive(Debug, Clone, Default)]
pub struct IterFilters {
    pub limit_item_types: Option<HashSet<String>>,
    pub item_date_start: Option<DateTime<Utc>>,
    pub item_date_end: Option<DateTime<Utc>>,
    /// Dedupe by `item_id` across every WARC in the supplied set, not just
    /// within one file.
    pub dedupe: bool,
}

fn is_gzip_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false)
}

/// Iterate response records across `paths` in order, decode chunked bodies,
/// hand selected records to `handler`, and apply `filters`. Accumulates
/// matches into a `Vec` rather than a lazy iterator since dedupe requires
/// cross-file state that outlives any single file's reader.
pub fn iter_warc_items(
    paths: &[PathBuf],
    handler: &dyn WarcRecordHandler,
    filters: &IterFilters,
) -> Result<Vec<IterItem>> {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut items = Vec::new();

    for path in paths {
        if is_gzip_path(path) {
            let reader = WarcReader::from_path_gzip(path).map_err(|e| WarcError::Open {
                path: path.clone(),
                source: anyhow::anyhow!(e.to_string()),
            })?;
            collect_from_reader(reader, path, handler, filters, &mut seen_ids, &mut items)?;
        } else {
            let reader = WarcReader::from_path(path).map_err(|e| WarcError::Open {
                path: path.clone(),
                source: anyhow::anyhow!(e.to_string()),
            })?;
            collect_from_reader(reader, path, handler, filters, &mut seen_ids, &mut items)?;
        }
    }

    Ok(items)
}

fn collect_from_reader<R: std::io::BufRead>(
    reader: WarcReader<R>,
    path: &Path,
    handler: &dyn WarcRecordHandler,
    filters: &IterFilters,
    seen_ids: &mut HashSet<String>,
    items: &mut Vec<IterItem>,
) -> Result<()> {
    for record in reader.iter_records() {
        let record = record.map_err(|e| WarcError::MalformedRecord {
            path: path.to_path_buf(),
            source: anyhow::anyhow!(e.to_string()),
        })?;

        if *record.warc_type() != RecordType::Response {
            continue;
        }

        let url = record
            .header(WarcHeader::TargetURI)
            .map(|c| c.to_string())
            .unwrap_or_default();

        if !handler.select_record(&url) {
            continue;
        }

        let body = extract_http_body(record.body());

        for item in handler.item_iter(&url, &body) {
            if let Some(limit) = &filters.limit_item_types {
                if !limit.contains(&item.item_type) {
                    continue;
                }
            }
            if let Some(start) = filters.item_date_start {
                if item.item_date < start {
                    continue;
                }
            }
            if let Some(end) = filters.item_date_end {
                if item.item_date > end {
                    continue;
                }
            }
            if filters.dedupe {
                if seen_ids.contains(&item.item_id) {
                    continue;
                }
                seen_ids.insert(item.item_id.clone());
            }
            items.push(item);
        }
    }

    Ok(())
}
