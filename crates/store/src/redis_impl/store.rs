use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionLike, ConnectionManager};
use redis::AsyncCommands;

use reqscope_core::kv::{ttl_secs, KeyTtl, KeyValueStore, Result};

use super::error::map_redis_error;

/// Redis key/value store.
///
/// Generic over the connection so the same command mapping serves a single
/// node (`ConnectionManager`, the default) and a cluster
/// (`redis::cluster_async::ClusterConnection`).
#[derive(Clone)]
pub struct RedisStore<C = ConnectionManager> {
    conn: C,
}

impl RedisStore {
    /// Connects to a single Redis node.
    ///
    /// # Arguments
    ///
    /// * `url` - Redis connection URL (e.g., "redis://localhost:6379")
    ///
    /// # Errors
    ///
    /// Returns `KvError::BackendUnavailable` if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;
        Ok(Self { conn })
    }
}

#[cfg(feature = "redis-cluster")]
impl RedisStore<redis::cluster_async::ClusterConnection> {
    /// Connects to a Redis cluster through any of its seed nodes.
    pub async fn connect_cluster(urls: &[String]) -> Result<Self> {
        let client = redis::cluster::ClusterClient::new(urls.to_vec()).map_err(map_redis_error)?;
        let conn = client
            .get_async_connection()
            .await
            .map_err(map_redis_error)?;
        Ok(Self { conn })
    }
}

impl<C> RedisStore<C> {
    /// Wraps an already established connection.
    pub fn from_connection(conn: C) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl<C> KeyValueStore for RedisStore<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(map_redis_error)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(duration) => conn
                .set_ex::<_, _, ()>(key, value, ttl_secs(duration))
                .await
                .map_err(map_redis_error),
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .map_err(map_redis_error),
        }
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.set_nx(key, value).await.map_err(map_redis_error)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        conn.del(keys).await.map_err(map_redis_error)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.exists(key).await.map_err(map_redis_error)
    }

    async fn incr_by(&self, key: &str, by: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        conn.incr(key, by).await.map_err(map_redis_error)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        conn.expire(key, ttl_secs(ttl) as i64)
            .await
            .map_err(map_redis_error)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        let mut conn = self.conn.clone();
        let reply: i64 = conn.ttl(key).await.map_err(map_redis_error)?;
        Ok(KeyTtl::from_reply(reply))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }
}
