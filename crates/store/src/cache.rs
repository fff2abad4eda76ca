//! Namespaced JSON cache.
//!
//! Binds a [`KeyValueStore`] to one [`KeyPrefix`] and stores values as JSON
//! text. Read paths degrade to a miss on undecodable payloads so that a single
//! corrupt record cannot take a caller down; backend outages are still
//! reported.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;

use reqscope_core::kv::{KeyPrefix, KeyValueStore, KvError, Namespace, Result};

/// Typed JSON view over one namespace of a key/value store.
#[derive(Clone)]
pub struct NamespacedCache {
    store: Arc<dyn KeyValueStore>,
    prefix: KeyPrefix,
}

impl NamespacedCache {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: KeyPrefix) -> Self {
        Self { store, prefix }
    }

    /// Builds the cache for `namespace` under the given global prefix.
    pub fn for_namespace(store: Arc<dyn KeyValueStore>, global: &str, namespace: Namespace) -> Self {
        Self::new(store, KeyPrefix::new(global, namespace))
    }

    pub fn prefix(&self) -> &KeyPrefix {
        &self.prefix
    }

    /// Full backend key for `key`.
    pub fn key(&self, key: impl Display) -> String {
        self.prefix.key(key)
    }

    /// Serializes `value` and stores it with `ttl`.
    ///
    /// Returns `Ok(false)` when the value cannot be encoded or the backend
    /// refuses the write; an unreachable backend is an error.
    pub async fn set<T>(&self, key: impl Display, value: &T, ttl: Duration) -> Result<bool>
    where
        T: Serialize + ?Sized,
    {
        let key = self.key(key);
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!(%key, error = %err, "Failed to serialize cache value");
                return Ok(false);
            }
        };

        match self.store.set(&key, &json, Some(ttl)).await {
            Ok(()) => Ok(true),
            Err(err @ KvError::BackendUnavailable(_)) => Err(err),
            Err(err) => {
                tracing::error!(%key, error = %err, value = %json, "Cache write rejected");
                Ok(false)
            }
        }
    }

    /// Reads and decodes the value at `key`.
    ///
    /// Missing keys and payloads that do not decode as `T` both yield `None`.
    pub async fn get<T>(&self, key: impl Display) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let key = self.key(key);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                tracing::error!(%key, error = %err, payload = %raw, "Cache value failed to decode");
                Ok(None)
            }
        }
    }

    /// Deletes all `keys` concurrently.
    ///
    /// Every key is attempted even when some fail; the first failure is
    /// returned afterwards. Absent keys are not an error.
    pub async fn delete<K>(&self, keys: &[K]) -> Result<()>
    where
        K: Display,
    {
        let keys: Vec<String> = keys.iter().map(|k| self.key(k)).collect();
        let results = join_all(keys.iter().map(|key| async move {
            let outcome = self.store.delete(std::slice::from_ref(key)).await;
            if let Err(ref err) = outcome {
                tracing::warn!(%key, error = %err, "Failed to delete cache key");
            }
            outcome
        }))
        .await;

        results.into_iter().find_map(Result::err).map_or(Ok(()), Err)
    }

    pub async fn exists(&self, key: impl Display) -> Result<bool> {
        self.store.exists(&self.key(key)).await
    }

    /// Resets the expiry of `key`. Returns false when the key does not exist.
    pub async fn expire(&self, key: impl Display, ttl: Duration) -> Result<bool> {
        self.store.expire(&self.key(key), ttl).await
    }

    /// Remaining lifetime in seconds, `-1` when the key is absent or has no expiry.
    pub async fn ttl(&self, key: impl Display) -> Result<i64> {
        Ok(self.store.ttl(&self.key(key)).await?.as_secs())
    }
}
