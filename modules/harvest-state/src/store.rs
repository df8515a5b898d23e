use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, StateError};

/// A two-level keyed store: `resource_type -> (key -> value)`.
///
/// Implementations are the source of truth across process crashes — readers
/// must not cache values across calls, since a different process may have
/// written the most recent value. See `JsonStateStore` for the
/// reload-on-every-call discipline this implies.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, resource_type: &str, key: &str) -> Result<Option<Value>>;

    /// `value = None` deletes the key; if the resource type becomes empty it
    /// is removed too.
    async fn set(&self, resource_type: &str, key: &str, value: Option<Value>) -> Result<()>;
}

type StateMap = BTreeMap<String, BTreeMap<String, Value>>;

/// Does nothing. Used when a harvest has no need to track per-resource cursors.
pub struct NullStateStore;

#[async_trait]
impl StateStore for NullStateStore {
    async fn get(&self, _resource_type: &str, _key: &str) -> Result<Option<Value>> {
        Ok(None)
    }

    async fn set(&self, _resource_type: &str, _key: &str, _value: Option<Value>) -> Result<()> {
        Ok(())
    }
}

/// A `StateStore` backed by `<path>/state.json`, reloaded and rewritten on
/// every call. Writes go to `state.json.tmp` then `rename()` over
/// `state.json`, so a reader during a concurrent write always observes either
/// the old complete content or the new complete content.
pub struct JsonStateStore {
    dir: PathBuf,
}

impl JsonStateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn state_path(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    fn tmp_path(&self) -> PathBuf {
        self.dir.join("state.json.tmp")
    }

    fn load(path: &Path) -> Result<StateMap> {
        if !path.exists() {
            return Ok(StateMap::new());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| StateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| StateError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    fn persist(&self, state: &StateMap) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|source| StateError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let tmp = self.tmp_path();
        let contents = serde_json::to_vec(state).expect("StateMap always serializes");
        std::fs::write(&tmp, contents).map_err(|source| StateError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, self.state_path()).map_err(|source| StateError::Write {
            path: self.state_path(),
            source,
        })
    }
}

fn apply_set(state: &mut StateMap, resource_type: &str, key: &str, value: Option<Value>) {
    match value {
        Some(v) => {
            state
                .entry(resource_type.to_string())
                .or_default()
                .insert(key.to_string(), v);
        }
        None => {
            if let Some(keys) = state.get_mut(resource_type) {
                keys.remove(key);
                if keys.is_empty() {
                    state.remove(resource_type);
                }
            }
        }
    }
}

#[async_trait]
impl StateStore for JsonStateStore {
    async fn get(&self, resource_type: &str, key: &str) -> Result<Option<Value>> {
        let path = self.state_path();
        let dir = self.dir.clone();
        let resource_type = resource_type.to_string();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let state = Self::load(&path)?;
            let _ = &dir;
            Ok(state.get(&resource_type).and_then(|k| k.get(&key)).cloned())
        })
        .await
        .expect("state store blocking task panicked")
    }

    async fn set(&self, resource_type: &str, key: &str, value: Option<Value>) -> Result<()> {
        let dir = self.dir.clone();
        let resource_type = resource_type.to_string();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let store = JsonStateStore { dir };
            let mut state = Self::load(&store.state_path())?;
            apply_set(&mut state, &resource_type, &key, value);
            store.persist(&state)
        })
        .await
        .expect("state store blocking task panicked")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path());
        assert_eq!(store.get("twitter_user", "sfm").await.unwrap(), None);

        store
            .set("twitter_user", "sfm", Some(Value::from(1234)))
            .await
            .unwrap();
        assert_eq!(
            store.get("twitter_user", "sfm").await.unwrap(),
            Some(Value::from(1234))
        );
        assert!(dir.path().join("state.json").exists());
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn deleting_the_last_key_removes_the_resource_type() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStateStore::new(dir.path());
        store.set("twitter_user", "sfm", Some(Value::from(1))).await.unwrap();
        store.set("twitter_user", "sfm", None).await.unwrap();

        let contents = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
        let state: StateMap = serde_json::from_str(&contents).unwrap();
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn a_second_store_instance_observes_committed_writes() {
        let dir = tempfile::tempdir().unwrap();
        let writer = JsonStateStore::new(dir.path());
        writer.set("rt", "k", Some(Value::from("v"))).await.unwrap();

        let reader = JsonStateStore::new(dir.path());
        assert_eq!(reader.get("rt", "k").await.unwrap(), Some(Value::from("v")));
    }

    #[tokio::test]
    async fn null_store_always_absent() {
        let store = NullStateStore;
        store.set("rt", "k", Some(Value::from(1))).await.unwrap();
        assert_eq!(store.get("rt", "k").await.unwrap(), None);
    }
}
