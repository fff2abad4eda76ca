//! Distributed sequence counters.
//!
//! Counters live under the id-counter namespace as plain integer strings and
//! are advanced with the backend's atomic `INCRBY`, so concurrent callers on
//! any number of processes never receive the same value.

use std::sync::Arc;

use reqscope_core::kv::{KeyPrefix, KeyValueStore, KvError, Namespace, Result};
use reqscope_core::sequence::IncrementOptions;

/// Mints increasing integer ids per counter name.
#[derive(Clone)]
pub struct DistributedSequence {
    store: Arc<dyn KeyValueStore>,
    prefix: KeyPrefix,
}

impl DistributedSequence {
    pub fn new(store: Arc<dyn KeyValueStore>, global_prefix: &str) -> Self {
        Self {
            store,
            prefix: KeyPrefix::new(global_prefix, Namespace::IdCounter),
        }
    }

    fn key(&self, name: &str) -> String {
        self.prefix.key(name)
    }

    /// Advances `name` and returns the new value.
    ///
    /// With `reset` the counter is deleted instead and 0 is returned, so the
    /// next plain increment starts over. A `ttl` is only attached by the
    /// increment that creates the counter.
    pub async fn increment(&self, name: &str, options: IncrementOptions) -> Result<i64> {
        let key = self.key(name);
        if options.reset {
            self.store.delete(&[key]).await?;
            tracing::debug!(counter = name, "Sequence reset");
            return Ok(0);
        }

        let value = self.store.incr_by(&key, options.step()).await?;

        if let Some(ttl) = options.ttl {
            if options.is_first_write(value) {
                // The value is already minted; a failed expiry only leaves the
                // counter persistent.
                if let Err(err) = self.store.expire(&key, ttl).await {
                    tracing::warn!(counter = name, error = %err, "Failed to attach counter expiry");
                }
            }
        }

        Ok(value)
    }

    /// Increments `name` by one with no expiry.
    pub async fn next(&self, name: &str) -> Result<i64> {
        self.increment(name, IncrementOptions::new()).await
    }

    /// Seeds `name` with `start`.
    ///
    /// With `force` the stored value is overwritten unconditionally; otherwise
    /// the write only happens when the counter does not exist yet. Returns
    /// whether a value was written.
    pub async fn initialize(&self, name: &str, start: i64, force: bool) -> Result<bool> {
        let key = self.key(name);
        let value = start.to_string();

        if force {
            self.store.set(&key, &value, None).await?;
            tracing::warn!(counter = name, value = start, "Sequence force reset");
            return Ok(true);
        }

        let written = self.store.set_if_absent(&key, &value).await?;
        if written {
            tracing::warn!(counter = name, value = start, "Sequence initialized");
        } else {
            tracing::warn!(counter = name, "Sequence already initialized, keeping stored value");
        }
        Ok(written)
    }

    /// Returns the stored value of `name`.
    ///
    /// A counter that was never used is materialized by a first increment,
    /// so this returns 1 and leaves the counter at 1.
    pub async fn current_value(&self, name: &str) -> Result<i64> {
        let key = self.key(name);
        match self.store.get(&key).await? {
            Some(raw) => raw.trim().parse::<i64>().map_err(|err| {
                tracing::error!(counter = name, payload = %raw, error = %err, "Corrupt sequence value");
                KvError::Serialization(format!("counter {name} holds non-integer {raw:?}"))
            }),
            None => self.next(name).await,
        }
    }

    /// Deletes `name`; the next increment starts again at its step size.
    pub async fn clear(&self, name: &str) -> Result<()> {
        tracing::warn!(counter = name, "Clearing sequence");
        self.store.delete(&[self.key(name)]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use super::*;
    use crate::MemoryStore;

    fn sequence() -> (DistributedSequence, MemoryStore) {
        let store = MemoryStore::default();
        (DistributedSequence::new(Arc::new(store.clone()), "test"), store)
    }

    #[tokio::test]
    async fn test_order_scenario() {
        let (seq, _) = sequence();

        assert_eq!(seq.increment("order", IncrementOptions::new()).await.unwrap(), 1);
        assert_eq!(seq.increment("order", IncrementOptions::new()).await.unwrap(), 2);
        assert_eq!(seq.increment("order", IncrementOptions::new()).await.unwrap(), 3);
        assert_eq!(seq.increment("order", IncrementOptions::new()).await.unwrap(), 4);

        assert_eq!(seq.increment("order", IncrementOptions::reset()).await.unwrap(), 0);
        assert_eq!(seq.increment("order", IncrementOptions::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_counter_survives_a_full_store() {
        let memory = MemoryStore::new(100);
        let store: Arc<dyn KeyValueStore> = Arc::new(memory);
        let seq = DistributedSequence::new(store.clone(), "test");
        let captcha = crate::CaptchaStore::new(store, "test");

        assert_eq!(seq.next("users").await.unwrap(), 1);
        assert_eq!(seq.next("users").await.unwrap(), 2);

        for i in 0..250 {
            captcha
                .issue(&format!("flood-{i}"), Duration::from_secs(300))
                .await
                .unwrap();
        }

        assert_eq!(seq.next("users").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_counter_is_stored_as_plain_integer() {
        let (seq, store) = sequence();
        seq.next("users").await.unwrap();
        seq.next("users").await.unwrap();

        assert_eq!(
            store.get("test:id_counter:users").await.unwrap(),
            Some("2".to_string())
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_have_no_gaps_or_duplicates() {
        let (seq, _) = sequence();
        seq.initialize("orders", 100, true).await.unwrap();

        let handles: Vec<_> = (0..200)
            .map(|_| {
                let seq = seq.clone();
                tokio::spawn(async move { seq.next("orders").await.unwrap() })
            })
            .collect();

        let mut values = Vec::with_capacity(200);
        for handle in handles {
            values.push(handle.await.unwrap());
        }

        let unique: HashSet<i64> = values.iter().copied().collect();
        assert_eq!(unique.len(), 200);
        values.sort_unstable();
        assert_eq!(values, (101..=300).collect::<Vec<i64>>());
    }

    #[tokio::test]
    async fn test_increment_by_step() {
        let (seq, _) = sequence();
        let opts = IncrementOptions::new().by(10);

        assert_eq!(seq.increment("batch", opts).await.unwrap(), 10);
        assert_eq!(seq.increment("batch", opts).await.unwrap(), 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_only_attached_on_creation() {
        let (seq, store) = sequence();
        let opts = IncrementOptions::new().with_ttl(Duration::from_secs(30));

        assert_eq!(seq.increment("rate", opts).await.unwrap(), 1);
        tokio::time::advance(Duration::from_secs(20)).await;
        assert_eq!(seq.increment("rate", opts).await.unwrap(), 2);

        // The second increment did not push the expiry out.
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(!store.exists("test:id_counter:rate").await.unwrap());
        assert_eq!(seq.increment("rate", opts).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_plain_increment_never_expires() {
        let (seq, store) = sequence();
        seq.next("users").await.unwrap();

        assert_eq!(
            store.ttl("test:id_counter:users").await.unwrap(),
            reqscope_core::kv::KeyTtl::Persistent
        );
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent_without_force() {
        let (seq, _) = sequence();

        assert!(seq.initialize("users", 500, false).await.unwrap());
        assert!(!seq.initialize("users", 900, false).await.unwrap());

        assert_eq!(seq.current_value("users").await.unwrap(), 500);
        assert_eq!(seq.next("users").await.unwrap(), 501);
    }

    #[tokio::test]
    async fn test_initialize_force_overwrites() {
        let (seq, _) = sequence();
        for _ in 0..5 {
            seq.next("users").await.unwrap();
        }

        assert!(seq.initialize("users", 2, true).await.unwrap());
        assert_eq!(seq.current_value("users").await.unwrap(), 2);

        assert!(seq.initialize("users", 1000, true).await.unwrap());
        assert_eq!(seq.current_value("users").await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn test_current_value_materializes_fresh_counter() {
        let (seq, store) = sequence();

        assert_eq!(seq.current_value("fresh").await.unwrap(), 1);
        assert_eq!(
            store.get("test:id_counter:fresh").await.unwrap(),
            Some("1".to_string())
        );
        assert_eq!(seq.current_value("fresh").await.unwrap(), 1);
        assert_eq!(seq.next("fresh").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_corrupt_counter_is_an_error() {
        let (seq, store) = sequence();
        store
            .set("test:id_counter:broken", "twelve", None)
            .await
            .unwrap();

        let err = seq.current_value("broken").await.unwrap_err();
        assert!(matches!(err, KvError::Serialization(_)));
        assert!(seq.next("broken").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_restarts_at_step() {
        let (seq, _) = sequence();
        seq.initialize("users", 41, true).await.unwrap();

        seq.clear("users").await.unwrap();
        seq.clear("users").await.unwrap();

        assert_eq!(
            seq.increment("users", IncrementOptions::new().by(3))
                .await
                .unwrap(),
            3
        );
    }
}
