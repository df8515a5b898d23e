use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use harvest_bus::MessageHandler;
use harvest_common::HarvestRequest;
use serde::Deserialize;
use tracing::warn;

use crate::process_table::ProcessSupervisor;

/// Minimal payload for `harvest.stop.*` — only the id is needed to look up
/// the managed process.
#[derive(Debug, Deserialize)]
struct StopRequest {
    id: String,
}

/// Dispatches `harvest.start.*` / `harvest.stop.*` deliveries to a
/// [`ProcessSupervisor`]: a start writes a per-id config file under the
/// watched directory and asks the supervisor to spawn the platform harvester
/// binary in streaming mode; a stop asks the supervisor to terminate it and
/// deletes the config file.
pub struct StreamController {
    supervisor: Arc<ProcessSupervisor>,
    watched_dir: PathBuf,
    harvester_command: String,
}

impl StreamController {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        watched_dir: impl Into<PathBuf>,
        harvester_command: impl Into<String>,
    ) -> Self {
        Self {
            supervisor,
            watched_dir: watched_dir.into(),
            harvester_command: harvester_command.into(),
        }
    }

    fn conf_path(&self, safe_id: &str) -> PathBuf {
        self.watched_dir.join(format!("{safe_id}.conf.json"))
    }

    async fn handle_start(&self, body: &[u8]) -> anyhow::Result<()> {
        let request: HarvestRequest = serde_json::from_slice(body)?;
        let safe_id = harvest_common::safe_string(&request.id);
        std::fs::create_dir_all(&self.watched_dir)?;

        let conf_path = self.conf_path(&safe_id);
        std::fs::write(&conf_path, serde_json::to_vec(&request)?)?;

        self.supervisor
            .add(
                &request.id,
                &self.harvester_command,
                &[
                    "--config".to_string(),
                    conf_path.to_string_lossy().into_owned(),
                    "--stream".to_string(),
                ],
            )
            .await?;
        Ok(())
    }

    async fn handle_stop(&self, body: &[u8]) -> anyhow::Result<()> {
        let stop: StopRequest = serde_json::from_slice(body)?;
        let safe_id = harvest_common::safe_string(&stop.id);

        self.supervisor.stop(&stop.id).await?;

        let conf_path = self.conf_path(&safe_id);
        if conf_path.exists() {
            std::fs::remove_file(&conf_path)?;
        }
        Ok(())
    }

    /// SIGTERM pause-all contract: signal every managed process to pause,
    /// then stop them all.
    pub async fn shutdown(&self) {
        self.supervisor.pause_all().await;
        self.supervisor.stop_all().await;
    }
}

#[async_trait]
impl MessageHandler for StreamController {
    async fn on_message(&self, routing_key: &str, body: &[u8]) -> anyhow::Result<()> {
        if routing_key.starts_with("harvest.start.") {
            self.handle_start(body).await
        } else if routing_key.starts_with("harvest.stop.") {
            self.handle_stop(body).await
        } else {
            warn!(routing_key, "stream controller received an unrecognized routing key");
            Ok(())
        }
    }
}
