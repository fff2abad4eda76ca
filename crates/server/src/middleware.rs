//! Per-request scope middleware.
//!
//! Opens the ambient [`context`] scope for every request, resolves the
//! session presented by the client and runs the rest of the stack inside a
//! tracing span tagged with the request id and client address.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use reqscope_core::context::{self, extract_client_ip, RequestHead, RequestId, ScopeState};
use reqscope_core::session::SessionId;

use crate::{
    extractors::{session_id_from_headers, PresentedSessionId},
    state::AppState,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_scope(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let peer = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let request_id = RequestId::from_header(
        parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok()),
    );
    let client_ip = extract_client_ip(&parts.headers, peer);
    let session_id = session_id_from_headers(&parts.headers, &state.config.cookie_name);

    parts
        .extensions
        .insert(PresentedSessionId(session_id.clone()));
    let head = RequestHead::from(&parts);
    let request = Request::from_parts(parts, body);

    let span = tracing::info_span!(
        "request",
        %request_id,
        %client_ip,
        method = %head.method,
        uri = %head.uri,
    );
    let initial = ScopeState::new(request_id, client_ip).with_request(head);

    let mut response = context::with_scope(
        initial,
        async move {
            if let Some(id) = session_id {
                attach_session(&state, &id).await;
            }
            next.run(request).await
        }
        .instrument(span),
    )
    .await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Loads the presented session into the current scope and slides its TTL.
///
/// Store failures are logged and the request continues without a session.
async fn attach_session(state: &AppState, id: &SessionId) {
    let payload = match state.sessions.load(id).await {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to load session, continuing anonymously");
            return;
        }
    };

    let Some(session) = payload.and_then(|p| p.data) else {
        return;
    };

    if let Err(err) = state.sessions.touch(id, state.config.session_ttl()).await {
        tracing::warn!(error = %err, "Failed to refresh session TTL");
    }

    tracing::debug!(user_id = session.user_id, "Session attached");
    if let Err(err) = context::set_session(Some(session)) {
        tracing::error!(error = %err, "Failed to attach session");
    }
}
