//! Pure types for request-scoped context.

use std::sync::Arc;

use http::{request::Parts, HeaderMap, Method, Uri, Version};
use uuid::Uuid;

use crate::session::Session;

/// Unique identifier for a request, used for tracing and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Reuses a caller-supplied id when it is a valid UUID, otherwise mints one.
    pub fn from_header(value: Option<&str>) -> Self {
        value
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(Self::from_uuid)
            .unwrap_or_default()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The parts of the inbound request kept for the lifetime of the scope.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HeaderMap,
}

impl From<&Parts> for RequestHead {
    fn from(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            version: parts.version,
            headers: parts.headers.clone(),
        }
    }
}

/// State carried by one request scope.
#[derive(Debug, Clone)]
pub struct ScopeState {
    pub request_id: RequestId,
    pub client_ip: String,
    pub request: Option<Arc<RequestHead>>,
    pub session: Option<Session>,
}

impl ScopeState {
    pub fn new(request_id: RequestId, client_ip: impl Into<String>) -> Self {
        Self {
            request_id,
            client_ip: client_ip.into(),
            request: None,
            session: None,
        }
    }

    pub fn with_request(mut self, request: RequestHead) -> Self {
        self.request = Some(Arc::new(request));
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }
}
