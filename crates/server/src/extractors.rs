//! Axum extractors for the ambient session.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use axum_extra::extract::CookieJar;

use reqscope_core::context;
use reqscope_core::session::{Session, SessionId};

use crate::error::{ApiError, AppError};

/// Session id presented by the client.
///
/// The `Authorization: Bearer` header is tried first (API clients), then the
/// session cookie (browsers).
pub fn session_id_from_headers(headers: &HeaderMap, cookie_name: &str) -> Option<SessionId> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    if let Some(token) = bearer {
        return Some(SessionId::new(token));
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value())
        .filter(|value| !value.is_empty())
        .map(SessionId::new)
}

/// Session id resolved by the request-scope middleware.
#[derive(Debug, Clone)]
pub struct PresentedSessionId(pub Option<SessionId>);

impl<S> FromRequestParts<S> for PresentedSessionId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<PresentedSessionId>()
            .cloned()
            .unwrap_or(PresentedSessionId(None)))
    }
}

/// Logged-in session of the current request. Rejects with 401 otherwise.
pub struct CurrentSession(pub Session);

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(_parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = context::session()?.ok_or(ApiError::NoLogin)?;
        Ok(CurrentSession(session))
    }
}

/// Logged-in administrator. Rejects with 401 or 403.
pub struct AdminSession(pub Session);

impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;
        if !session.is_admin() {
            tracing::warn!(user_id = session.user_id, "Non-admin session denied");
            return Err(ApiError::NotAuth.into());
        }
        Ok(AdminSession(session))
    }
}
