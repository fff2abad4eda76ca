//! In-memory key/value store with LRU eviction.
//!
//! Mirrors the Redis semantics the rest of the crate relies on: integer
//! increments are atomic (they run under the write lock), `INCRBY` keeps an
//! existing expiry, and expired keys behave exactly like missing ones.
//!
//! Only keys carrying an expiry live in the LRU. Keys without one (counters,
//! seeded sequences) are kept outside it and are never evicted, so a flood of
//! short-lived keys cannot reset a sequence. `max_entries` therefore bounds the
//! expiring keys only.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::RwLock;
use tokio::time::Instant;

use reqscope_core::kv::{ttl_secs, KeyTtl, KeyValueStore, KvError, Result};

/// A single stored value with optional expiration.
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: String, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(expiry),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }
}

fn expiry(ttl: Duration) -> Instant {
    Instant::now() + Duration::from_secs(ttl_secs(ttl))
}

/// Expiring keys in LRU order, persistent keys on the side.
#[derive(Debug)]
struct Entries {
    volatile: LruCache<String, Entry>,
    persistent: HashMap<String, Entry>,
}

impl Entries {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            volatile: LruCache::new(capacity),
            persistent: HashMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.volatile.len() + self.persistent.len()
    }

    /// Returns the live entry for `key`, dropping it first if it has expired.
    fn live(&mut self, key: &str) -> Option<&mut Entry> {
        if self.persistent.contains_key(key) {
            return self.persistent.get_mut(key);
        }
        let now = Instant::now();
        if self.volatile.peek(key).is_some_and(|entry| entry.is_expired(now)) {
            self.volatile.pop(key);
            return None;
        }
        self.volatile.get_mut(key)
    }

    /// Removes `key` and returns it if it was still live.
    fn take(&mut self, key: &str) -> Option<Entry> {
        let entry = self
            .persistent
            .remove(key)
            .or_else(|| self.volatile.pop(key))?;
        (!entry.is_expired(Instant::now())).then_some(entry)
    }

    /// Stores `entry`, placing it by whether it carries an expiry.
    fn insert(&mut self, key: String, entry: Entry) {
        if entry.expires_at.is_none() {
            self.volatile.pop(key.as_str());
            self.persistent.insert(key, entry);
            return;
        }

        self.persistent.remove(key.as_str());
        if !self.volatile.contains(key.as_str()) && self.volatile.len() >= self.volatile.cap().get() {
            self.purge_expired();
        }
        self.volatile.put(key, entry);
    }

    // Expired keys are otherwise only dropped when read; clear them before the
    // LRU has to evict a live one.
    fn purge_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<String> = self
            .volatile
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.volatile.pop(key.as_str());
        }
    }
}

/// In-memory key/value store.
///
/// Thread-safe via `Arc<RwLock<..>>`; clones share the same data.
/// Expiry is lazy: an expired key is removed the next time it is touched, or
/// when the LRU is full.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    store: Arc<RwLock<Entries>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(10_000)
    }
}

impl MemoryStore {
    /// Creates a store holding at most `max_entries` expiring keys (at least one).
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            store: Arc::new(RwLock::new(Entries::new(capacity))),
        }
    }

    /// Number of keys currently held, expired ones included.
    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut store = self.store.write().await;
        Ok(store.live(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut store = self.store.write().await;
        store.insert(key.to_string(), Entry::new(value.to_string(), ttl));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let mut store = self.store.write().await;
        if store.live(key).is_some() {
            return Ok(false);
        }
        store.insert(key.to_string(), Entry::new(value.to_string(), None));
        Ok(true)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        let mut store = self.store.write().await;
        let mut removed = 0;
        for key in keys {
            if store.take(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut store = self.store.write().await;
        Ok(store.live(key).is_some())
    }

    async fn incr_by(&self, key: &str, by: i64) -> Result<i64> {
        let mut store = self.store.write().await;
        match store.live(key) {
            Some(entry) => {
                let next = entry
                    .value
                    .parse::<i64>()
                    .ok()
                    .and_then(|current| current.checked_add(by))
                    .ok_or_else(|| {
                        KvError::OperationFailed(
                            "value is not an integer or out of range".to_string(),
                        )
                    })?;
                entry.value = next.to_string();
                Ok(next)
            }
            None => {
                store.insert(key.to_string(), Entry::new(by.to_string(), None));
                Ok(by)
            }
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut store = self.store.write().await;
        match store.take(key) {
            Some(mut entry) => {
                entry.expires_at = Some(expiry(ttl));
                store.insert(key.to_string(), entry);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let mut store = self.store.write().await;
        let Some(entry) = store.live(key) else {
            return Ok(KeyTtl::Missing);
        };
        Ok(match entry.expires_at {
            None => KeyTtl::Persistent,
            Some(at) => {
                let remaining = at.saturating_duration_since(Instant::now());
                // Round to the nearest second like Redis does.
                KeyTtl::Expires(Duration::from_secs(
                    ((remaining.as_millis() + 500) / 1000) as u64,
                ))
            }
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
