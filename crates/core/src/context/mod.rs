//! Ambient request context.
//!
//! A [`RequestContext`] is opened once per inbound request with
//! [`with_scope`] and is then reachable from any code polled inside that
//! future, however deep, without being passed as an argument. Tasks spawned
//! through [`spawn`] share the same context by reference.
//!
//! ```ignore
//! let state = ScopeState::new(RequestId::new(), "10.0.0.1");
//! context::with_scope(state, async {
//!     let id = context::request_id()?;
//!     tracing::info!(request_id = %id, "handling request");
//!     Ok::<_, ScopeError>(())
//! })
//! .await?;
//! ```

mod client_ip;
mod error;
mod scope;
mod types;

pub use client_ip::extract_client_ip;
pub use error::ScopeError;
pub use scope::{
    client_ip, current, request, request_id, session, set_client_ip, set_request, set_request_id,
    set_session, spawn, try_current, with_scope, RequestContext,
};
pub use types::{RequestHead, RequestId, ScopeState};
