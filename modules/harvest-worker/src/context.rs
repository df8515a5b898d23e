use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use harvest_common::HarvestRequest;
use harvest_result::HarvestResult;
use harvest_state::DelayedSetAdapter;
use tokio::sync::{Mutex, Notify};

/// Everything a platform harvester needs to do its work: identity, seeds,
/// the directories it writes into, and the state store it reads/writes
/// through. Held behind an `Arc` so the harvester runtime, the producer
/// callback, and the processing worker can all see the same instance.
pub struct HarvestContext {
    pub request: HarvestRequest,
    pub safe_id: String,
    /// `<harvest.path>` — where finalized WARCs and `state.json` live.
    pub harvest_path: PathBuf,
    /// `<working>/tmp/<safe_id>` — the recording proxy's output directory.
    pub temp_dir: PathBuf,
    pub state: Arc<DelayedSetAdapter>,
    /// Producers must race their own I/O against `stop_producer.notified()`
    /// via `tokio::select!` and return promptly once notified — the runtime
    /// never forcibly cancels `harvest_seeds`.
    pub stop_producer: Arc<Notify>,
    /// Set once a graceful SIGTERM-driven shutdown has been initiated, so
    /// the processing worker can tell a status message finishing the drain
    /// apart from ordinary running-state status messages.
    pub stopping: Arc<AtomicBool>,
}

impl HarvestContext {
    pub fn state_path(&self) -> PathBuf {
        self.harvest_path.join("state.json")
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(std::sync::atomic::Ordering::SeqCst)
    }
}

/// Platform-specific capability a harvest is driven by. No concrete
/// implementation (Twitter, Reddit, …) ships from this crate — each
/// platform harvester binary supplies its own.
#[async_trait]
pub trait HarvestProducer: Send + Sync {
    /// Issue the platform API calls for this harvest through the recording
    /// proxy (the proxy's env vars are already active while this runs).
    /// For a stream, returns once `ctx.stop_producer` fires; for a one-shot,
    /// returns once all seeds have been fully harvested. `result` is shared
    /// with the rest of the harvest; a producer reports per-seed errors
    /// (`token_not_found`, `uid_unauthorized`, …) via `append_error`/
    /// `append_warning` and records token/uid rotations in
    /// `result.token_updates`/`result.uids` directly.
    async fn harvest_seeds(
        &self,
        ctx: &HarvestContext,
        result: &Arc<Mutex<HarvestResult>>,
    ) -> anyhow::Result<()>;

    /// Called once per closed WARC, after it has been moved to its final
    /// dated location, to update stats / state from its contents. `result`
    /// is the same shared accumulator `harvest_seeds` reports through; this
    /// is where a producer calls `increment_stats` for the items the WARC
    /// contains.
    async fn process_warc(
        &self,
        ctx: &HarvestContext,
        path: &Path,
        result: &Arc<Mutex<HarvestResult>>,
    ) -> anyhow::Result<()>;

    /// Streams roll WARCs over via restart and never let the proxy interrupt
    /// in-flight requests except on shutdown; one-shots run once to
    /// completion.
    fn is_streaming(&self) -> bool;
}
