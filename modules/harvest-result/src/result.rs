use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use harvest_common::Msg;

use crate::error::{Result, ResultError};
use crate::snapshot::ResultSnapshot;

/// Mutable accumulator owned by a single active harvest (or export). Tracks
/// messages, persisted WARCs, per-day item stats, and the token/uid maps a
/// producer reports between `warc_created` notifications.
///
/// `success` is false iff an error message has been appended — there is no
/// separate "failed" flag to keep in sync, so `append_error` is the only way
/// a `HarvestResult` becomes unsuccessful.
#[derive(Debug, Clone)]
pub struct HarvestResult {
    pub success: bool,
    pub started: DateTime<Utc>,
    pub ended: Option<DateTime<Utc>>,
    pub infos: Vec<Msg>,
    pub warnings: Vec<Msg>,
    pub errors: Vec<Msg>,
    pub warcs: Vec<PathBuf>,
    pub warc_bytes: u64,
    /// Day-insertion-ordered; never re-sorted by date.
    stats: Vec<(NaiveDate, BTreeMap<String, u64>)>,
    pub token_updates: BTreeMap<String, String>,
    pub uids: BTreeMap<String, String>,
}

impl HarvestResult {
    pub fn new() -> Self {
        Self {
            success: true,
            started: Utc::now(),
            ended: None,
            infos: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            warcs: Vec::new(),
            warc_bytes: 0,
            stats: Vec::new(),
            token_updates: BTreeMap::new(),
            uids: BTreeMap::new(),
        }
    }

    pub fn append_info(&mut self, msg: Msg) {
        self.infos.push(msg);
    }

    pub fn append_warning(&mut self, msg: Msg) {
        self.warnings.push(msg);
    }

    pub fn append_error(&mut self, msg: Msg) {
        self.errors.push(msg);
        self.success = false;
    }

    pub fn add_warc(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let bytes = std::fs::metadata(&path)
            .map_err(|source| ResultError::Stat {
                path: path.clone(),
                source,
            })?
            .len();
        self.warc_bytes += bytes;
        self.warcs.push(path);
        Ok(())
    }

    /// Clear `token_updates`/`uids`. Called after every `warc_created`
    /// notification, since both maps are cumulative only between
    /// notifications — `stats` is cumulative for the whole harvest and is
    /// never cleared.
    pub fn clear_notification_scoped_fields(&mut self) {
        self.token_updates.clear();
        self.uids.clear();
    }

    pub fn increment_stats(&mut self, item: &str, count: u64, day: Option<NaiveDate>) {
        let day = day.unwrap_or_else(|| Utc::now().date_naive());
        match self.stats.iter_mut().find(|(d, _)| *d == day) {
            Some((_, counter)) => {
                *counter.entry(item.to_string()).or_insert(0) += count;
            }
            None => {
                let mut counter = BTreeMap::new();
                counter.insert(item.to_string(), count);
                self.stats.push((day, counter));
            }
        }
    }

    pub fn stats(&self) -> &[(NaiveDate, BTreeMap<String, u64>)] {
        &self.stats
    }

    pub fn stats_summary(&self) -> BTreeMap<String, u64> {
        let mut summary = BTreeMap::new();
        for (_, counter) in &self.stats {
            for (item, count) in counter {
                *summary.entry(item.clone()).or_insert(0) += count;
            }
        }
        summary
    }

    pub fn to_snapshot(&self) -> ResultSnapshot {
        ResultSnapshot {
            warcs: self
                .warcs
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            warc_bytes: self.warc_bytes,
            stats: self.stats.clone(),
            started: self.started,
            infos: self.infos.clone(),
            warnings: self.warnings.clone(),
            errors: self.errors.clone(),
        }
    }

    /// Rehydrate from a snapshot written by a prior (crashed or paused) run.
    /// `token_updates`/`uids` are not part of the snapshot — they are
    /// notification-scoped and never need to survive a restart.
    pub fn restore_from_snapshot(snapshot: ResultSnapshot) -> Self {
        let success = snapshot.errors.is_empty();
        Self {
            success,
            started: snapshot.started,
            ended: None,
            infos: snapshot.infos,
            warnings: snapshot.warnings,
            errors: snapshot.errors,
            warcs: snapshot.warcs.into_iter().map(PathBuf::from).collect(),
            warc_bytes: snapshot.warc_bytes,
            stats: snapshot.stats,
            token_updates: BTreeMap::new(),
            uids: BTreeMap::new(),
        }
    }

    pub fn save_snapshot(&self, path: &Path) -> Result<()> {
        let snapshot = self.to_snapshot();
        snapshot.save(path)?;
        tracing::debug!(path = %path.display(), "persisted result snapshot");
        Ok(())
    }
}

impl Default for HarvestResult {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn append_error_flips_success() {
        let mut result = HarvestResult::new();
        assert!(result.success);
        result.append_error(Msg::new("unknown_error", "boom"));
        assert!(!result.success);
    }

    #[test]
    fn add_warc_accumulates_bytes_from_filesystem_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.warc.gz");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(b"Fake warc").unwrap();
        drop(f);

        let mut result = HarvestResult::new();
        result.add_warc(&path).unwrap();
        assert_eq!(result.warc_bytes, 9);
        assert_eq!(result.warcs, vec![path]);
    }

    #[test]
    fn increment_stats_preserves_day_insertion_order() {
        let mut result = HarvestResult::new();
        let d1 = NaiveDate::from_ymd_opt(2015, 11, 9).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2015, 11, 8).unwrap();
        result.increment_stats("tweet", 5, Some(d1));
        result.increment_stats("tweet", 3, Some(d2));
        result.increment_stats("tweet", 2, Some(d1));

        let days: Vec<_> = result.stats().iter().map(|(d, _)| *d).collect();
        assert_eq!(days, vec![d1, d2]);
        assert_eq!(result.stats()[0].1["tweet"], 7);
        assert_eq!(result.stats_summary()["tweet"], 10);
    }

    #[test]
    fn snapshot_round_trip_preserves_stats_and_messages() {
        let mut result = HarvestResult::new();
        result.increment_stats("tweet", 10, Some(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()));
        result.append_warning(Msg::new("harvest_resumed", "resumed"));

        let snapshot = result.to_snapshot();
        let restored = HarvestResult::restore_from_snapshot(snapshot);
        assert_eq!(restored.stats_summary()["tweet"], 10);
        assert_eq!(restored.warnings.len(), 1);
    }

    #[test]
    fn clear_notification_scoped_fields_leaves_stats_untouched() {
        let mut result = HarvestResult::new();
        result.increment_stats("tweet", 1, None);
        result.token_updates.insert("uid1".into(), "tok1".into());
        result.uids.insert("tok1".into(), "uid1".into());

        result.clear_notification_scoped_fields();

        assert!(result.token_updates.is_empty());
        assert!(result.uids.is_empty());
        assert_eq!(result.stats_summary()["tweet"], 1);
    }
}
