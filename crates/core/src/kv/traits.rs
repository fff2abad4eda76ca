use std::time::Duration;

use async_trait::async_trait;

use super::Result;

/// Remaining lifetime of a key, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist.
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key exists and expires after the given duration.
    Expires(Duration),
}

impl KeyTtl {
    /// Maps the integer reply of a Redis `TTL` command.
    pub fn from_reply(reply: i64) -> Self {
        match reply {
            -2 => Self::Missing,
            n if n < 0 => Self::Persistent,
            n => Self::Expires(Duration::from_secs(n as u64)),
        }
    }

    /// Remaining seconds, or `-1` when the key is missing or never expires.
    pub fn as_secs(&self) -> i64 {
        match self {
            Self::Expires(d) => d.as_secs() as i64,
            Self::Missing | Self::Persistent => -1,
        }
    }
}

/// Primitive operations of a single-node or clustered key/value backend.
///
/// Every method is one round-trip. Increments are atomic at the backend;
/// implementations must never emulate them with a read followed by a write
/// from the client.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Gets the value stored at `key`.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Sets `key` to `value`, with an expiry when `ttl` is given.
    ///
    /// Sub-second TTLs are rounded up to one second.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Sets `key` only when it does not exist yet. Returns true when written.
    async fn set_if_absent(&self, key: &str, value: &str) -> Result<bool>;

    /// Deletes the given keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    /// Returns true when `key` exists.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Atomically increments the integer at `key` by `by`, creating it at 0 first.
    async fn incr_by(&self, key: &str, by: i64) -> Result<i64>;

    /// Attaches an expiry to `key`. Returns false when the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Returns the remaining lifetime of `key`.
    async fn ttl(&self, key: &str) -> Result<KeyTtl>;

    /// Round-trips to the backend without touching any key.
    async fn ping(&self) -> Result<()>;
}

/// Converts a TTL to the whole-second count sent to the backend.
pub fn ttl_secs(ttl: Duration) -> u64 {
    let secs = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs.max(1)
    }
}
