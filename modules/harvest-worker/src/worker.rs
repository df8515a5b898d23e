use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use harvest_bus::MessageBus;
use harvest_common::{
    spaced_service_name, CollectionRef, CollectionSetRef, HarvestRef, HarvestRequest,
    HarvestStatus, Msg, WarcCountSummary, WarcCreatedMessage, WarcRef,
};
use harvest_proxy::{ProxyConfig, RecordingProxy};
use harvest_result::{snapshot_path as result_snapshot_path, HarvestResult, ResultSnapshot};
use harvest_state::{DelayedSetAdapter, JsonStateStore};
use sha1::{Digest, Sha1};
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::{HarvestContext, HarvestProducer};
use crate::error::{HarvestError, Result};
use crate::queue::ProcessingQueue;
use crate::timers::{list_closed_warcs, spawn_queue_scan_timer, spawn_rollover_timer};
use crate::HarvesterConfig;

/// Owns the full lifecycle of one harvest: proxy, producer invocation,
/// incremental processing, status reporting, retry, pause, and resume.
///
/// Generic over the platform capability `P`; no platform-specific code
/// lives in this crate.
pub struct HarvesterWorker<P: HarvestProducer + 'static> {
    ctx: Arc<HarvestContext>,
    producer: Arc<P>,
    bus: Arc<dyn MessageBus>,
    config: HarvesterConfig,
    result: Arc<Mutex<HarvestResult>>,
    stop_loop: CancellationToken,
    /// Latched by SIGUSR1 (or a test driving the same flag directly);
    /// checked only at finalization so it always wins a race against
    /// `stop_loop` being cancelled in the same tick.
    pause_pending: Arc<AtomicBool>,
    service_name: String,
}

impl<P: HarvestProducer + 'static> HarvesterWorker<P> {
    pub fn new(
        request: HarvestRequest,
        harvest_path: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        producer: Arc<P>,
        bus: Arc<dyn MessageBus>,
        config: HarvesterConfig,
        service_name: impl Into<String>,
    ) -> Self {
        let safe_id = harvest_common::safe_string(&request.id);
        let harvest_path = harvest_path.into();
        let working_dir = working_dir.into();
        let temp_dir = working_dir.join("tmp").join(&safe_id);

        let store = Arc::new(JsonStateStore::new(harvest_path.clone()));
        let state = Arc::new(DelayedSetAdapter::new(store));

        let ctx = Arc::new(HarvestContext {
            request,
            safe_id,
            harvest_path,
            temp_dir,
            state,
            stop_producer: Arc::new(Notify::new()),
            stopping: Arc::new(AtomicBool::new(false)),
        });

        Self {
            ctx,
            producer,
            bus,
            config,
            result: Arc::new(Mutex::new(HarvestResult::new())),
            stop_loop: CancellationToken::new(),
            pause_pending: Arc::new(AtomicBool::new(false)),
            service_name: spaced_service_name(&service_name.into()),
        }
    }

    pub fn context(&self) -> &Arc<HarvestContext> {
        &self.ctx
    }

    pub fn stop_loop_token(&self) -> CancellationToken {
        self.stop_loop.clone()
    }

    /// Set by a SIGUSR1 handler (or directly, in tests) to request the
    /// harvest end in `paused` rather than `completed` state.
    pub fn request_pause(&self) {
        self.pause_pending.store(true, Ordering::SeqCst);
    }

    /// Set by a SIGTERM handler (or directly, in tests): marks the harvest
    /// as stopping, cancels the outer loop, and wakes any producer blocked
    /// on `stop_producer` so it returns promptly. The in-flight processing
    /// worker is never interrupted — it finishes the WARC it is on.
    pub fn initiate_graceful_stop(&self) {
        self.ctx.stopping.store(true, Ordering::SeqCst);
        self.stop_loop.cancel();
        self.ctx.stop_producer.notify_waiters();
    }

    fn working_dir(&self) -> PathBuf {
        self.ctx
            .temp_dir
            .parent()
            .expect("temp_dir is always <working>/tmp/<safe_id>")
            .parent()
            .expect("temp_dir is always <working>/tmp/<safe_id>")
            .to_path_buf()
    }

    fn snapshot_path(&self) -> PathBuf {
        result_snapshot_path(&self.working_dir(), &self.ctx.safe_id)
    }

    /// Run to completion: one-shot harvests return after a single pass;
    /// streams loop until `stop_loop` is cancelled.
    pub async fn run(&self) -> Result<()> {
        std::fs::create_dir_all(&self.ctx.temp_dir).map_err(|e| HarvestError::Other(e.into()))?;
        std::fs::create_dir_all(&self.ctx.harvest_path)
            .map_err(|e| HarvestError::Other(e.into()))?;

        let (queue, mut queue_rx) = ProcessingQueue::new();

        let resumed = self.resume_if_needed(&queue).await?;
        self.publish_status(HarvestStatus::Running).await?;
        if resumed {
            info!(harvest_id = %self.ctx.request.id, "resumed harvest from persisted snapshot");
        }

        let queue_scan_handle = spawn_queue_scan_timer(
            self.ctx.temp_dir.clone(),
            self.config.queue_warc_files_interval,
            queue.clone(),
        );
        let rollover_handle = if self.producer.is_streaming() {
            self.config
                .stream_restart_interval_secs
                .map(|secs| spawn_rollover_timer(secs, self.ctx.stop_producer.clone()))
        } else {
            None
        };

        let processing_handle = {
            let ctx = self.ctx.clone();
            let result = self.result.clone();
            let producer = self.producer.clone();
            let bus = self.bus.clone();
            let snapshot_path = self.snapshot_path();
            let service_name = self.service_name.clone();
            tokio::spawn(async move {
                process_loop(
                    ctx,
                    producer,
                    bus,
                    result,
                    &mut queue_rx,
                    snapshot_path,
                    service_name,
                )
                .await;
            })
        };

        let mut failure: Option<anyhow::Error> = None;

        while !self.stop_loop.is_cancelled() {
            let mut tries_left = self.config.tries.max(1);
            let mut succeeded = false;

            loop {
                let proxy_config = ProxyConfig::new(self.ctx.temp_dir.clone(), self.ctx.safe_id.clone())
                    .with_rollover_secs(if self.producer.is_streaming() {
                        None
                    } else {
                        self.config.warc_rollover_secs
                    })
                    .with_interrupt_on_shutdown(self.producer.is_streaming());

                let guard = RecordingProxy::start(proxy_config).await;
                let guard = match guard {
                    Ok(g) => g,
                    Err(e) => {
                        tries_left -= 1;
                        warn!(error = %e, tries_left, "failed to start recording proxy");
                        if tries_left == 0 {
                            failure = Some(e.into());
                            break;
                        }
                        continue;
                    }
                };

                let outcome = self.producer.harvest_seeds(&self.ctx, &self.result).await;
                let _ = guard.shutdown().await;

                match outcome {
                    Ok(()) => {
                        succeeded = true;
                        break;
                    }
                    Err(e) => {
                        tries_left -= 1;
                        warn!(error = %e, tries_left, "producer failed");
                        self.enqueue_closed_warcs(&queue).await;
                        queue.wait_drained().await;
                        if tries_left == 0 {
                            failure = Some(e);
                            break;
                        }
                    }
                }
            }

            self.enqueue_closed_warcs(&queue).await;

            if !succeeded || !self.producer.is_streaming() {
                self.stop_loop.cancel();
            }

            if self.stop_loop.is_cancelled() {
                break;
            }
        }

        if let Some(handle) = rollover_handle {
            handle.abort();
        }
        queue_scan_handle.abort();

        queue.wait_drained().await;
        drop(queue);
        let _ = processing_handle.await;

        self.finalize(failure).await
    }

    async fn enqueue_closed_warcs(&self, queue: &ProcessingQueue) {
        for path in list_closed_warcs(&self.ctx.temp_dir) {
            queue.enqueue(path).await;
        }
    }

    /// If a result snapshot or leftover temp WARCs exist, restore state and
    /// enqueue the existing WARCs before any new harvesting begins. Returns
    /// whether a resume actually happened.
    async fn resume_if_needed(&self, queue: &ProcessingQueue) -> Result<bool> {
        let snapshot_path = self.snapshot_path();
        let existing_snapshot = ResultSnapshot::load(&snapshot_path)?;
        let existing_warcs = list_closed_warcs(&self.ctx.temp_dir);

        if existing_snapshot.is_none() && existing_warcs.is_empty() {
            return Ok(false);
        }

        {
            let mut result = self.result.lock().await;
            if let Some(snapshot) = existing_snapshot {
                *result = HarvestResult::restore_from_snapshot(snapshot);
            }
            result.append_warning(Msg::new(
                "harvest_resumed",
                format!("harvest resumed at {}", Utc::now().to_rfc3339()),
            ));
        }

        for path in existing_warcs {
            queue.enqueue(path).await;
        }

        Ok(true)
    }

    async fn finalize(&self, failure: Option<anyhow::Error>) -> Result<()> {
        let mut result = self.result.lock().await;

        if let Some(e) = failure {
            result.append_error(Msg::new("unknown_error", e.to_string()));
        }

        let paused = self.pause_pending.load(Ordering::SeqCst);
        let status = if paused {
            HarvestStatus::Paused
        } else if result.success {
            HarvestStatus::CompletedSuccess
        } else {
            HarvestStatus::CompletedFailure
        };

        if !paused {
            result.ended = Some(Utc::now());
        }

        let message = build_status_message(&self.ctx, &result, status, &self.service_name);
        drop(result);

        self.bus
            .publish(&status_routing_key(&self.ctx.request.routing_key), serde_json::to_vec(&message).expect("status message always serializes"))
            .await?;

        if paused {
            info!(harvest_id = %self.ctx.request.id, "harvest paused, snapshot preserved");
        } else {
            ResultSnapshot::delete_if_present(&self.snapshot_path())?;
            let _ = std::fs::remove_dir_all(&self.ctx.temp_dir);
            info!(harvest_id = %self.ctx.request.id, status = status.as_wire_str(), "harvest finalized");
        }

        Ok(())
    }

    async fn publish_status(&self, status: HarvestStatus) -> Result<()> {
        let result = self.result.lock().await;
        let message = build_status_message(&self.ctx, &result, status, &self.service_name);
        drop(result);
        self.bus
            .publish(
                &status_routing_key(&self.ctx.request.routing_key),
                serde_json::to_vec(&message).expect("status message always serializes"),
            )
            .await?;
        Ok(())
    }
}

fn status_routing_key(start_routing_key: &str) -> String {
    if start_routing_key.is_empty() {
        return "harvest.status".to_string();
    }
    start_routing_key.replacen("harvest.start", "harvest.status", 1)
}

fn build_status_message(
    ctx: &HarvestContext,
    result: &HarvestResult,
    status: HarvestStatus,
    service_name: &str,
) -> harvest_common::StatusMessage {
    let stats = result
        .stats()
        .iter()
        .map(|(day, counter)| (day.format("%Y-%m-%d").to_string(), counter.clone()))
        .collect();

    harvest_common::StatusMessage {
        id: ctx.request.id.clone(),
        status,
        infos: result.infos.clone(),
        warnings: result.warnings.clone(),
        errors: result.errors.clone(),
        date_started: result.started,
        date_ended: result.ended,
        stats,
        token_updates: result.token_updates.clone(),
        uids: result.uids.clone(),
        warcs: Some(WarcCountSummary {
            count: result.warcs.len(),
            bytes: result.warc_bytes,
        }),
        service: service_name.to_string(),
        host: hostname(),
        instance: std::process::id().to_string(),
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// Background task, lifetime = harvester lifetime: dequeues closed WARC
/// filenames, processes them, moves them to their dated final location,
/// commits the delayed state store, and publishes `warc_created` plus a
/// running/stopping status.
async fn process_loop<P: HarvestProducer + 'static>(
    ctx: Arc<HarvestContext>,
    producer: Arc<P>,
    bus: Arc<dyn MessageBus>,
    result: Arc<Mutex<HarvestResult>>,
    queue_rx: &mut crate::queue::ProcessingQueueReceiver,
    snapshot_path: PathBuf,
    service_name: String,
) {
    while let Some(path) = queue_rx.recv().await {
        if !path.exists() {
            queue_rx.mark_done();
            continue;
        }

        if let Err(e) = process_one_warc(&ctx, &producer, &bus, &result, &path, &snapshot_path, &service_name).await
        {
            warn!(error = %e, path = %path.display(), "failed to process WARC");
        }

        queue_rx.mark_done();
    }
}

async fn process_one_warc<P: HarvestProducer + 'static>(
    ctx: &Arc<HarvestContext>,
    producer: &Arc<P>,
    bus: &Arc<dyn MessageBus>,
    result: &Arc<Mutex<HarvestResult>>,
    path: &Path,
    snapshot_path: &Path,
    service_name: &str,
) -> Result<()> {
    producer
        .process_warc(ctx, path, result)
        .await
        .map_err(HarvestError::Producer)?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| HarvestError::Other(anyhow::anyhow!("WARC path has no filename")))?;
    let dated_path = harvest_warc::dated_path_for_filename(file_name)
        .map_err(|e| HarvestError::Other(e.into()))?;

    let dest_dir = ctx.harvest_path.join(&dated_path);
    std::fs::create_dir_all(&dest_dir).map_err(|e| HarvestError::Other(e.into()))?;
    let dest_path = dest_dir.join(file_name);

    std::fs::rename(path, &dest_path).map_err(|source| HarvestError::Move {
        from: path.to_path_buf(),
        to: dest_path.clone(),
        source,
    })?;

    ctx.state.commit().await?;

    let bytes = std::fs::metadata(&dest_path)
        .map_err(|e| HarvestError::Other(e.into()))?
        .len();
    let sha1_hex = sha1_hex_of_file(&dest_path).map_err(|e| HarvestError::Other(e.into()))?;
    let warc_id = Uuid::new_v4().simple().to_string();
    let date_created = Utc::now();

    let stopping = ctx.is_stopping();

    {
        let mut result = result.lock().await;
        result
            .add_warc(dest_path.clone())
            .map_err(|e| HarvestError::Other(e.into()))?;
    }

    let warc_created = WarcCreatedMessage {
        harvest: HarvestRef {
            id: ctx.request.id.clone(),
            harvest_type: ctx.request.harvest_type.clone(),
        },
        collection_set: CollectionSetRef {
            id: ctx.request.collection_set.id.clone(),
        },
        collection: CollectionRef {
            id: ctx.request.collection.id.clone(),
        },
        warc: WarcRef {
            id: warc_id,
            path: dest_path.to_string_lossy().into_owned(),
            date_created,
            bytes,
            sha1: sha1_hex,
        },
    };

    bus.publish(
        "warc_created",
        serde_json::to_vec(&warc_created).expect("warc_created always serializes"),
    )
    .await?;

    let status = if stopping {
        HarvestStatus::Stopping
    } else {
        HarvestStatus::Running
    };
    let result_guard = result.lock().await;
    let message = build_status_message(ctx, &result_guard, status, service_name);
    drop(result_guard);
    bus.publish(
        &status_routing_key(&ctx.request.routing_key),
        serde_json::to_vec(&message).expect("status message always serializes"),
    )
    .await?;

    {
        let mut result = result.lock().await;
        result.clear_notification_scoped_fields();
        if let Err(e) = result.save_snapshot(snapshot_path) {
            warn!(error = %e, "failed to persist result snapshot, continuing without it");
        }
    }

    Ok(())
}

fn sha1_hex_of_file(path: &Path) -> anyhow::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha1::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}
