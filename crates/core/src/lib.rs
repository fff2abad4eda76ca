//! Core building blocks shared by the store backends and the serving shell.
//!
//! - [`kv`]: the key/value store contract, key namespacing and errors
//! - [`context`]: ambient, per-request state propagated through async code
//! - [`session`]: session payload types and identifier generation
//! - [`sequence`]: options for distributed counters

pub mod context;
pub mod kv;
pub mod sequence;
pub mod session;
