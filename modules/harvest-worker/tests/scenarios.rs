//! End-to-end scenario tests driving `HarvesterWorker` against a fake
//! producer and an in-memory bus — no real recording proxy binary or
//! broker connection is required. `PROXY_COMMAND` is pointed at `true`,
//! which spawns and exits immediately; the fake producer writes its WARCs
//! directly into the temp directory, standing in for what a real producer
//! would have written through the proxy.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use harvest_bus::{InMemoryBus, MessageBus};
use harvest_common::{CollectionRef, CollectionSetRef, HarvestRequest};
use harvest_result::HarvestResult;
use harvest_worker::{HarvestContext, HarvestProducer, HarvesterConfig, HarvesterWorker};
use tokio::sync::Mutex;

fn new_bus() -> Arc<dyn MessageBus> {
    Arc::new(InMemoryBus::new())
}

fn use_noop_proxy_command() {
    std::env::set_var("PROXY_COMMAND", "true");
}

fn test_request(id: &str) -> HarvestRequest {
    HarvestRequest {
        id: id.to_string(),
        harvest_type: "test_harvester".to_string(),
        path: String::new(),
        collection_set: CollectionSetRef { id: "cs".to_string() },
        collection: CollectionRef { id: "c".to_string() },
        seeds: Vec::new(),
        routing_key: "harvest.start.test.u".to_string(),
    }
}

fn write_fake_warc(ctx: &HarvestContext, timestamp_suffix: &str) -> std::path::PathBuf {
    let name = format!("{}-{}-00000.warc.gz", ctx.safe_id, timestamp_suffix);
    let path = ctx.temp_dir.join(name);
    std::fs::write(&path, b"Fake warc").unwrap();
    path
}

struct OneShotProducer {
    fail_until_call: usize,
    calls: AtomicUsize,
}

impl OneShotProducer {
    fn always_succeeds() -> Self {
        Self {
            fail_until_call: 0,
            calls: AtomicUsize::new(0),
        }
    }

    fn fails_n_times_then_succeeds(n: usize) -> Self {
        Self {
            fail_until_call: n,
            calls: AtomicUsize::new(0),
        }
    }

    fn always_fails() -> Self {
        Self {
            fail_until_call: usize::MAX,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl HarvestProducer for OneShotProducer {
    async fn harvest_seeds(
        &self,
        ctx: &HarvestContext,
        _result: &Arc<Mutex<HarvestResult>>,
    ) -> anyhow::Result<()> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        if call_index < self.fail_until_call {
            anyhow::bail!("simulated producer failure");
        }
        write_fake_warc(ctx, "20151109195229879");
        Ok(())
    }

    async fn process_warc(
        &self,
        _ctx: &HarvestContext,
        _path: &Path,
        _result: &Arc<Mutex<HarvestResult>>,
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        false
    }
}

/// Producer that exercises the shared `result` handle both methods are
/// passed: reports a per-seed token error from `harvest_seeds` and
/// increments item stats from `process_warc`, the way a real platform
/// harvester reports rate-limit/auth failures and item counts.
struct StatsReportingProducer;

#[async_trait]
impl HarvestProducer for StatsReportingProducer {
    async fn harvest_seeds(
        &self,
        ctx: &HarvestContext,
        result: &Arc<Mutex<HarvestResult>>,
    ) -> anyhow::Result<()> {
        result
            .lock()
            .await
            .append_error(harvest_common::Msg::new("token_not_found", "no token for seed uid1"));
        write_fake_warc(ctx, "20151109195229879");
        Ok(())
    }

    async fn process_warc(
        &self,
        _ctx: &HarvestContext,
        _path: &Path,
        result: &Arc<Mutex<HarvestResult>>,
    ) -> anyhow::Result<()> {
        result.lock().await.increment_stats("tweet", 3, None);
        Ok(())
    }

    fn is_streaming(&self) -> bool {
        false
    }
}

async fn drain_messages(bus: &dyn MessageBus, expected: usize) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    for _ in 0..expected {
        let delivery = tokio::time::timeout(Duration::from_secs(5), bus.recv())
            .await
            .expect("timed out waiting for a published message")
            .unwrap()
            .expect("bus closed early");
        out.push(delivery.body);
    }
    out
}

#[tokio::test]
async fn s1_one_shot_success_relocates_warc_and_publishes_warc_created() {
    use_noop_proxy_command();
    let harvest_dir = tempfile::tempdir().unwrap();
    let working_dir = tempfile::tempdir().unwrap();
    let bus = new_bus();

    let worker = HarvesterWorker::new(
        test_request("test:1"),
        harvest_dir.path(),
        working_dir.path(),
        Arc::new(OneShotProducer::always_succeeds()),
        bus.clone(),
        HarvesterConfig {
            tries: 1,
            ..HarvesterConfig::default()
        },
        "TestHarvester",
    );

    worker.run().await.unwrap();

    // RUNNING (initial), warc_created, RUNNING (per-warc), completed success.
    let messages = drain_messages(&bus, 4).await;
    let warc_created: serde_json::Value = serde_json::from_slice(&messages[1]).unwrap();
    assert_eq!(warc_created["warc"]["bytes"], 9);
    assert_eq!(
        warc_created["warc"]["sha1"],
        "3d63d3c46d5dfac8495621c9c697e2089e5359b2"
    );

    let final_status: serde_json::Value = serde_json::from_slice(&messages[3]).unwrap();
    assert_eq!(final_status["status"], "completed success");
    assert_eq!(final_status["warcs"]["count"], 1);
    assert_eq!(final_status["warcs"]["bytes"], 9);

    let relocated = harvest_dir.path().join("2015/11/09/19");
    assert!(relocated.is_dir());
    assert_eq!(std::fs::read_dir(&relocated).unwrap().count(), 1);
}

#[tokio::test]
async fn s2_retryable_failure_succeeds_on_second_attempt() {
    use_noop_proxy_command();
    let harvest_dir = tempfile::tempdir().unwrap();
    let working_dir = tempfile::tempdir().unwrap();
    let bus = new_bus();

    let worker = HarvesterWorker::new(
        test_request("test:2"),
        harvest_dir.path(),
        working_dir.path(),
        Arc::new(OneShotProducer::fails_n_times_then_succeeds(1)),
        bus.clone(),
        HarvesterConfig {
            tries: 2,
            ..HarvesterConfig::default()
        },
        "TestHarvester",
    );

    worker.run().await.unwrap();

    let messages = drain_messages(&bus, 4).await;
    let final_status: serde_json::Value = serde_json::from_slice(&messages[3]).unwrap();
    assert_eq!(final_status["status"], "completed success");
    assert_eq!(final_status["warcs"]["count"], 1);
    assert!(final_status["errors"].as_array().map(|a| a.is_empty()).unwrap_or(true));
}

#[tokio::test]
async fn s3_exhausted_retries_reports_completed_failure() {
    use_noop_proxy_command();
    let harvest_dir = tempfile::tempdir().unwrap();
    let working_dir = tempfile::tempdir().unwrap();
    let bus = new_bus();

    let worker = HarvesterWorker::new(
        test_request("test:3"),
        harvest_dir.path(),
        working_dir.path(),
        Arc::new(OneShotProducer::always_fails()),
        bus.clone(),
        HarvesterConfig {
            tries: 2,
            ..HarvesterConfig::default()
        },
        "TestHarvester",
    );

    worker.run().await.unwrap();

    // RUNNING (initial), completed failure — no WARC was ever produced.
    let messages = drain_messages(&bus, 2).await;
    let final_status: serde_json::Value = serde_json::from_slice(&messages[1]).unwrap();
    assert_eq!(final_status["status"], "completed failure");
    let errors = final_status["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["code"], "unknown_error");
}

#[tokio::test]
async fn s5_resume_replays_existing_snapshot_and_temp_warcs() {
    use_noop_proxy_command();
    let harvest_dir = tempfile::tempdir().unwrap();
    let working_dir = tempfile::tempdir().unwrap();
    let bus = new_bus();

    let request = test_request("test:5");
    let safe_id = harvest_common::safe_string(&request.id);

    // Pre-seed a snapshot with two already-processed WARCs and one stat.
    let temp_dir = working_dir.path().join("tmp").join(&safe_id);
    std::fs::create_dir_all(&temp_dir).unwrap();
    let yesterday = chrono::Utc::now().date_naive() - chrono::Duration::days(1);
    let snapshot = harvest_result::ResultSnapshot {
        warcs: vec!["a.warc.gz".to_string(), "b.warc.gz".to_string()],
        warc_bytes: 20,
        stats: vec![(yesterday, [("stuff".to_string(), 10u64)].into_iter().collect())],
        started: chrono::Utc::now(),
        infos: Vec::new(),
        warnings: Vec::new(),
        errors: Vec::new(),
    };
    let snapshot_path = harvest_result::snapshot_path(working_dir.path(), &safe_id);
    snapshot.save(&snapshot_path).unwrap();

    // Pre-seed one stray temp WARC to be enqueued on resume.
    std::fs::write(
        temp_dir.join(format!("{safe_id}-20151108120000000-00000.warc.gz")),
        b"old warc",
    )
    .unwrap();

    let worker = HarvesterWorker::new(
        request,
        harvest_dir.path(),
        working_dir.path(),
        Arc::new(OneShotProducer::always_succeeds()),
        bus.clone(),
        HarvesterConfig {
            tries: 1,
            ..HarvesterConfig::default()
        },
        "TestHarvester",
    );

    worker.run().await.unwrap();

    // RUNNING, then a warc_created+status pair for the leftover temp WARC and
    // another for the newly harvested one (regardless of scan interleaving,
    // exactly two distinct files are ever moved — a re-scanned duplicate is
    // silently dropped by the dequeue-time existence check), then the final
    // completed status.
    let messages = drain_messages(&bus, 6).await;
    let final_status: serde_json::Value = serde_json::from_slice(&messages[5]).unwrap();
    assert_eq!(final_status["status"], "completed success");
    assert_eq!(final_status["warcs"]["count"], 4);
    assert_eq!(final_status["warcs"]["bytes"], 37);
    assert_eq!(final_status["stats"]["stuff"], serde_json::Value::Null);

    let has_resumed_warning = final_status["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .any(|w| w["code"] == "harvest_resumed");
    assert!(has_resumed_warning);

    let yesterday_key = yesterday.format("%Y-%m-%d").to_string();
    assert_eq!(final_status["stats"][&yesterday_key]["stuff"], 10);
}

#[tokio::test]
async fn producer_reported_errors_and_stats_surface_in_final_status() {
    use_noop_proxy_command();
    let harvest_dir = tempfile::tempdir().unwrap();
    let working_dir = tempfile::tempdir().unwrap();
    let bus = new_bus();

    let worker = HarvesterWorker::new(
        test_request("test:6"),
        harvest_dir.path(),
        working_dir.path(),
        Arc::new(StatsReportingProducer),
        bus.clone(),
        HarvesterConfig {
            tries: 1,
            ..HarvesterConfig::default()
        },
        "TestHarvester",
    );

    worker.run().await.unwrap();

    // RUNNING (initial), warc_created, RUNNING (per-warc), completed failure.
    let messages = drain_messages(&bus, 4).await;
    let final_status: serde_json::Value = serde_json::from_slice(&messages[3]).unwrap();
    assert_eq!(final_status["status"], "completed failure");
    assert_eq!(final_status["errors"][0]["code"], "token_not_found");
    assert_eq!(final_status["stats"].as_object().unwrap().values().next().unwrap()["tweet"], 3);
}
