use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::StateStore;

/// `None` is a pending delete, distinct from the key being absent from the
/// inner map entirely (no pending write at all for that key).
type Overlay = BTreeMap<String, BTreeMap<String, Option<Value>>>;

/// Wraps a `StateStore` with an in-memory overlay of pending `set` calls.
///
/// `set` only ever touches the overlay; nothing reaches the underlying store
/// until `commit()` is called. This lets the harvester batch every state
/// write a producer makes while processing one WARC and flush them together
/// right before the `warc_created` notification for that WARC is published.
pub struct DelayedSetAdapter {
    inner: Arc<dyn StateStore>,
    overlay: Mutex<Overlay>,
}

impl DelayedSetAdapter {
    pub fn new(inner: Arc<dyn StateStore>) -> Self {
        Self {
            inner,
            overlay: Mutex::new(Overlay::new()),
        }
    }

    /// Flush every pending `set` to the underlying store, then clear the
    /// overlay. Flushes are applied in resource-type, then key order for
    /// determinism; the underlying store itself reloads-then-writes on each
    /// call so this is safe even if other writers are interleaved.
    pub async fn commit(&self) -> Result<()> {
        let pending = {
            let mut overlay = self.overlay.lock().await;
            std::mem::take(&mut *overlay)
        };
        for (resource_type, keys) in pending {
            for (key, value) in keys {
                self.inner.set(&resource_type, &key, value).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for DelayedSetAdapter {
    async fn get(&self, resource_type: &str, key: &str) -> Result<Option<Value>> {
        {
            let overlay = self.overlay.lock().await;
            if let Some(pending) = overlay.get(resource_type).and_then(|k| k.get(key)) {
                // A pending delete (`None`) must not fall through to the
                // underlying store's still-committed value.
                return Ok(pending.clone());
            }
        }
        self.inner.get(resource_type, key).await
    }

    async fn set(&self, resource_type: &str, key: &str, value: Option<Value>) -> Result<()> {
        let mut overlay = self.overlay.lock().await;
        overlay
            .entry(resource_type.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonStateStore;

    #[tokio::test]
    async fn set_is_invisible_to_the_underlying_store_until_commit() {
        let dir = tempfile::tempdir().unwrap();
        let underlying: Arc<dyn StateStore> = Arc::new(JsonStateStore::new(dir.path()));
        let delayed = DelayedSetAdapter::new(underlying.clone());

        delayed.set("rt", "k", Some(Value::from(1))).await.unwrap();
        assert_eq!(underlying.get("rt", "k").await.unwrap(), None);
        assert_eq!(delayed.get("rt", "k").await.unwrap(), Some(Value::from(1)));

        delayed.commit().await.unwrap();
        assert_eq!(underlying.get("rt", "k").await.unwrap(), Some(Value::from(1)));
    }

    #[tokio::test]
    async fn get_prefers_overlay_over_underlying() {
        let dir = tempfile::tempdir().unwrap();
        let underlying: Arc<dyn StateStore> = Arc::new(JsonStateStore::new(dir.path()));
        underlying.set("rt", "k", Some(Value::from("old"))).await.unwrap();

        let delayed = DelayedSetAdapter::new(underlying);
        delayed.set("rt", "k", Some(Value::from("new"))).await.unwrap();
        assert_eq!(delayed.get("rt", "k").await.unwrap(), Some(Value::from("new")));
    }

    #[tokio::test]
    async fn commit_clears_the_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let underlying: Arc<dyn StateStore> = Arc::new(JsonStateStore::new(dir.path()));
        let delayed = DelayedSetAdapter::new(underlying);
        delayed.set("rt", "k", Some(Value::from(1))).await.unwrap();
        delayed.commit().await.unwrap();
        delayed.commit().await.unwrap(); // idempotent: nothing left to flush
    }

    #[tokio::test]
    async fn delete_of_an_already_committed_key_reaches_the_underlying_store() {
        let dir = tempfile::tempdir().unwrap();
        let underlying: Arc<dyn StateStore> = Arc::new(JsonStateStore::new(dir.path()));
        let delayed = DelayedSetAdapter::new(underlying.clone());

        delayed.set("rt", "k", Some(Value::from(1))).await.unwrap();
        delayed.commit().await.unwrap();
        assert_eq!(underlying.get("rt", "k").await.unwrap(), Some(Value::from(1)));

        delayed.set("rt", "k", None).await.unwrap();
        // Pending delete must hide the still-committed underlying value.
        assert_eq!(delayed.get("rt", "k").await.unwrap(), None);
        assert_eq!(underlying.get("rt", "k").await.unwrap(), Some(Value::from(1)));

        delayed.commit().await.unwrap();
        assert_eq!(underlying.get("rt", "k").await.unwrap(), None);
    }
}
