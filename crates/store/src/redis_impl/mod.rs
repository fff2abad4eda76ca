//! Redis key/value backend.
//!
//! Shares one multiplexed connection (or one cluster connection) across the
//! process. All atomicity comes from Redis itself.

mod error;
mod store;

pub use store::RedisStore;
