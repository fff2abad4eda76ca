//! Key/value backends and the components built on them.
//!
//! - [`MemoryStore`] / [`RedisStore`]: implementations of
//!   [`reqscope_core::kv::KeyValueStore`]
//! - [`NamespacedCache`]: typed JSON values under a fixed key prefix
//! - [`DistributedSequence`]: backend-atomic counters for primary keys
//! - [`SessionStore`]: session payloads with a per-login index
//! - [`CaptchaStore`]: short-lived captcha challenges
//! - [`PersistenceHooks`]: pre-persistence id minting and actor stamping

mod cache;
mod captcha;
mod hooks;
mod memory;
#[cfg(feature = "redis")]
mod redis_impl;
mod sequence;
mod session;

pub use cache::NamespacedCache;
pub use captcha::{generate_captcha_text, CaptchaCheck, CaptchaStore};
pub use hooks::{unix_now, Auditable, PersistenceHooks};
pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_impl::RedisStore;
pub use sequence::DistributedSequence;
pub use session::SessionStore;
