//! Application state.
//!
//! Every component shares one key/value backend; which one is chosen at
//! compile time through feature flags.

use std::sync::Arc;

use reqscope_core::kv::KeyValueStore;
use reqscope_store::{CaptchaStore, DistributedSequence, PersistenceHooks, SessionStore};

use crate::{config::Config, users::UserDirectory};

// ============================================================================
// Compile-time feature validation
// ============================================================================

// Store features: exactly one must be enabled, they are mutually exclusive
#[cfg(all(feature = "memory", feature = "redis"))]
compile_error!("Cannot enable both 'memory' and 'redis' store features");

#[cfg(not(any(feature = "memory", feature = "redis")))]
compile_error!("Must enable exactly one store feature: 'memory' or 'redis'");

/// Shared application state, cloned into every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn KeyValueStore>,
    pub sessions: SessionStore,
    pub sequence: DistributedSequence,
    pub captcha: CaptchaStore,
    pub hooks: PersistenceHooks,
    pub users: UserDirectory,
}

impl AppState {
    /// Wires every component to `store`.
    pub fn with_store(store: Arc<dyn KeyValueStore>, config: Config) -> Self {
        let prefix = config.redis_prefix.as_str();
        let sequence = DistributedSequence::new(store.clone(), prefix);

        Self {
            sessions: SessionStore::new(store.clone(), prefix),
            captcha: CaptchaStore::new(store.clone(), prefix),
            hooks: PersistenceHooks::new(sequence.clone()),
            sequence,
            users: UserDirectory::new(),
            store,
            config: Arc::new(config),
        }
    }
}

#[cfg(feature = "memory")]
mod memory {
    use super::*;
    use reqscope_store::MemoryStore;

    impl AppState {
        /// Creates AppState backed by the in-memory store.
        pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
            tracing::info!(
                max_entries = config.store_max_entries,
                "Using in-memory key/value store"
            );
            let store = Arc::new(MemoryStore::new(config.store_max_entries));
            Ok(Self::with_store(store, config))
        }
    }
}

#[cfg(feature = "redis")]
mod redis {
    use super::*;
    use reqscope_store::RedisStore;

    impl AppState {
        /// Creates AppState backed by Redis.
        pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
            let store = connect(&config.redis_url).await?;
            Ok(Self::with_store(store, config))
        }
    }

    #[cfg(feature = "redis-cluster")]
    async fn connect(url: &str) -> Result<Arc<dyn KeyValueStore>, anyhow::Error> {
        let nodes: Vec<String> = url
            .split(',')
            .map(str::trim)
            .filter(|node| !node.is_empty())
            .map(String::from)
            .collect();

        if nodes.len() > 1 {
            tracing::info!(nodes = nodes.len(), "Connecting to Redis cluster");
            return Ok(Arc::new(RedisStore::connect_cluster(&nodes).await?));
        }
        tracing::info!("Connecting to Redis");
        Ok(Arc::new(RedisStore::connect(url).await?))
    }

    #[cfg(not(feature = "redis-cluster"))]
    async fn connect(url: &str) -> Result<Arc<dyn KeyValueStore>, anyhow::Error> {
        tracing::info!("Connecting to Redis");
        Ok(Arc::new(RedisStore::connect(url).await?))
    }
}
