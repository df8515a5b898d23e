use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use harvest_common::Msg;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ResultError};

/// The subset of `HarvestResult` persisted to `<working>/<safe_id>_result.json`
/// after each successfully processed WARC, sufficient to resume a crashed or
/// restarted harvest. Day ordering in `stats` is preserved as an ordered
/// sequence of pairs rather than a map, since insertion order (not key order)
/// is what downstream consumers of the resumed `HarvestResult` rely on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSnapshot {
    pub warcs: Vec<String>,
    pub warc_bytes: u64,
    pub stats: Vec<(NaiveDate, std::collections::BTreeMap<String, u64>)>,
    pub started: DateTime<Utc>,
    pub infos: Vec<Msg>,
    pub warnings: Vec<Msg>,
    pub errors: Vec<Msg>,
}

impl ResultSnapshot {
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ResultError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let contents = serde_json::to_vec(self).expect("ResultSnapshot always serializes");
        std::fs::write(path, contents).map_err(|source| ResultError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ResultError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let snapshot = serde_json::from_str(&contents).map_err(|source| ResultError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(snapshot))
    }

    pub fn delete_if_present(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path).map_err(|source| ResultError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }
}

/// `<working>/<safe_id>_result.json`
pub fn snapshot_path(working_path: &Path, safe_id: &str) -> PathBuf {
    working_path.join(format!("{safe_id}_result.json"))
}
