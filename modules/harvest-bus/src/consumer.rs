use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::bus::{MessageBus, QueueBinding};
use crate::delivery::Delivery;
use crate::error::{BusError, Result};

/// Subclass hook invoked once per delivery. Implementations typically run a
/// harvester or exporter state machine to completion before returning.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, routing_key: &str, body: &[u8]) -> anyhow::Result<()>;

    /// Called instead of `on_message` when persisting the delivery to
    /// `last_message.json` itself failed — the handler never runs for this
    /// delivery, since there would be nothing to resume if the process died
    /// mid-handling.
    async fn on_persist_exception(&self, _err: &BusError) {}
}

fn last_message_path(working_dir: &Path) -> PathBuf {
    working_dir.join("last_message.json")
}

fn persist(working_dir: &Path, delivery: &Delivery) -> Result<()> {
    let path = last_message_path(working_dir);
    #[derive(serde::Serialize)]
    struct Persisted<'a> {
        routing_key: &'a str,
        body: &'a [u8],
    }
    let contents = serde_json::to_vec(&Persisted {
        routing_key: &delivery.routing_key,
        body: &delivery.body,
    })
    .expect("delivery always serializes");
    std::fs::write(&path, contents).map_err(|source| BusError::Persist { path, source })
}

fn load_persisted(working_dir: &Path) -> Result<Option<Delivery>> {
    let path = last_message_path(working_dir);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read(&path).map_err(|source| BusError::Persist {
        path: path.clone(),
        source,
    })?;
    #[derive(serde::Deserialize)]
    struct Persisted {
        routing_key: String,
        body: Vec<u8>,
    }
    let persisted: Persisted =
        serde_json::from_slice(&contents).map_err(|source| BusError::Malformed { path, source })?;
    Ok(Some(Delivery {
        routing_key: persisted.routing_key,
        body: persisted.body,
    }))
}

fn delete_persisted(working_dir: &Path) -> Result<()> {
    let path = last_message_path(working_dir);
    if path.exists() {
        std::fs::remove_file(&path).map_err(|source| BusError::Persist { path, source })?;
    }
    Ok(())
}

/// Generic single-active-message consumer runtime. Owns a bus and a working
/// directory for `last_message.json`; delegates the actual work to a
/// [`MessageHandler`]. SIGTERM (delivered by the caller via
/// [`BaseConsumer::stop_token`]) stops the loop after the in-flight handler
/// returns — never mid-handler.
pub struct BaseConsumer<H: MessageHandler> {
    bus: Arc<dyn MessageBus>,
    working_dir: PathBuf,
    handler: H,
    stop_token: CancellationToken,
}

impl<H: MessageHandler> BaseConsumer<H> {
    pub fn new(bus: Arc<dyn MessageBus>, working_dir: impl Into<PathBuf>, handler: H) -> Self {
        Self {
            bus,
            working_dir: working_dir.into(),
            handler,
            stop_token: CancellationToken::new(),
        }
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop_token.clone()
    }

    pub async fn declare_queues(&self, bindings: &[QueueBinding]) -> Result<()> {
        self.bus.declare_queues(bindings).await
    }

    /// Replay a persisted message without broker interaction. `delete`
    /// controls whether the file is removed afterward — callers doing a
    /// dry-run replay may want to keep it.
    pub async fn message_from_file(&self, path: &Path, delete: bool) -> Result<()> {
        let contents = std::fs::read(path).map_err(|source| BusError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
        #[derive(serde::Deserialize)]
        struct Persisted {
            routing_key: String,
            body: Vec<u8>,
        }
        let persisted: Persisted = serde_json::from_slice(&contents).map_err(|source| {
            BusError::Malformed {
                path: path.to_path_buf(),
                source,
            }
        })?;

        if let Err(e) = self
            .handler
            .on_message(&persisted.routing_key, &persisted.body)
            .await
        {
            error!(error = %e, routing_key = %persisted.routing_key, "handler failed replaying persisted message");
        }

        if delete {
            std::fs::remove_file(path).map_err(|source| BusError::Persist {
                path: path.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// If `last_message.json` exists in the working directory, replay and
    /// delete it. Called once on startup before entering [`BaseConsumer::run`].
    pub async fn resume_from_file(&self) -> Result<()> {
        let path = last_message_path(&self.working_dir);
        if !path.exists() {
            return Ok(());
        }
        info!(path = %path.display(), "resuming from persisted message");
        self.message_from_file(&path, true).await
    }

    pub async fn publish(&self, routing_key: &str, body: Vec<u8>) -> Result<()> {
        self.bus.publish(routing_key, body).await
    }

    /// Block consuming deliveries until `stop_token` is cancelled. The
    /// current handler invocation is never interrupted — cancellation is
    /// only observed between deliveries.
    pub async fn run(&self) -> Result<()> {
        loop {
            if self.stop_token.is_cancelled() {
                debug!("consumer stopping, no in-flight delivery");
                return Ok(());
            }

            let delivery = tokio::select! {
                _ = self.stop_token.cancelled() => {
                    debug!("consumer stopping, no in-flight delivery");
                    return Ok(());
                }
                delivery = self.bus.recv() => delivery?,
            };

            let Some(delivery) = delivery else {
                debug!("bus closed, stopping consumer");
                return Ok(());
            };

            if let Err(e) = persist(&self.working_dir, &delivery) {
                self.handler.on_persist_exception(&e).await;
                continue;
            }

            if let Err(e) = self
                .handler
                .on_message(&delivery.routing_key, &delivery.body)
                .await
            {
                error!(error = %e, routing_key = %delivery.routing_key, "handler returned an error");
            }

            if let Err(e) = delete_persisted(&self.working_dir) {
                error!(error = %e, "failed to delete persisted message after handling");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBus;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl MessageHandler for CountingHandler {
        async fn on_message(&self, _routing_key: &str, _body: &[u8]) -> anyhow::Result<()> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn handles_one_delivery_then_stops() {
        let dir = tempfile::tempdir().unwrap();
        let bus: Arc<dyn MessageBus> = Arc::new(InMemoryBus::new());
        let count = Arc::new(AtomicUsize::new(0));
        let consumer = BaseConsumer::new(
            bus.clone(),
            dir.path(),
            CountingHandler {
                count: count.clone(),
            },
        );

        bus.publish("harvest.start.twitter", b"{}".to_vec())
            .await
            .unwrap();

        let stop = consumer.stop_token();
        let handle = tokio::spawn(async move { consumer.run().await });

        // give the loop a moment to process the one delivery, then stop it
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        stop.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn persist_then_load_then_delete_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let delivery = Delivery {
            routing_key: "harvest.start.twitter".to_string(),
            body: b"{\"id\":\"abc\"}".to_vec(),
        };
        persist(dir.path(), &delivery).unwrap();
        let loaded = load_persisted(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.routing_key, delivery.routing_key);
        assert_eq!(loaded.body, delivery.body);

        delete_persisted(dir.path()).unwrap();
        assert!(load_persisted(dir.path()).unwrap().is_none());
    }
}
