use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::queue::ProcessingQueue;

/// Fires `stop_producer.notify_waiters()` on an interval so a stream
/// harvest's current `harvest_seeds` call returns promptly and the outer
/// loop can start a fresh proxy and WARC. Not spawned for one-shot
/// harvests.
pub fn spawn_rollover_timer(interval_secs: u64, stop_producer: Arc<Notify>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            debug!("rollover timer fired, signalling producer to restart");
            stop_producer.notify_waiters();
        }
    })
}

/// Periodically scans `temp_dir` for closed WARC files (`.warc` / `.warc.gz`)
/// and enqueues them for processing. The same file may be enqueued more than
/// once across ticks; the processing worker treats a missing file as a
/// no-op, which is the de-duplication mechanism.
pub fn spawn_queue_scan_timer(
    temp_dir: PathBuf,
    interval: Duration,
    queue: ProcessingQueue,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            for path in list_closed_warcs(&temp_dir) {
                queue.enqueue(path).await;
            }
        }
    })
}

pub fn list_closed_warcs(temp_dir: &std::path::Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(temp_dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            let name = p.to_string_lossy();
            name.ends_with(".warc") || name.ends_with(".warc.gz")
        })
        .collect()
}
