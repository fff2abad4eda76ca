//! Captcha, registration, login and logout handlers.

use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use reqscope_core::context;
use reqscope_core::session::{generate_session_id, Session, SessionPayload};
use reqscope_store::CaptchaCheck;

use crate::{
    error::{ApiError, ApiResponse, AppError},
    extractors::{CurrentSession, PresentedSessionId},
    state::AppState,
    users::UserRecord,
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

fn required(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CaptchaRequest {
    /// Client-chosen id the challenge is bound to.
    pub sid: String,
}

#[derive(Debug, Serialize)]
pub struct CaptchaResponse {
    pub sid: String,
    /// Challenge text; rendering it is up to the client.
    pub text: String,
    pub expires_in: u64,
}

/// POST /api/captcha - Issue a captcha challenge.
pub async fn captcha(
    State(state): State<AppState>,
    Json(body): Json<CaptchaRequest>,
) -> ApiResult<CaptchaResponse> {
    required("sid", &body.sid)?;

    let text = state
        .captcha
        .issue(&body.sid, state.config.captcha_ttl())
        .await?;

    Ok(ApiResponse::ok(CaptchaResponse {
        sid: body.sid,
        text,
        expires_in: state.config.captcha_ttl_seconds,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub user_name: String,
    pub password: String,
    pub phone: String,
    pub email: String,
}

/// POST /api/register - Create a user.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserRecord>>), AppError> {
    required("userName", &body.user_name)?;
    required("password", &body.password)?;
    required("phone", &body.phone)?;
    required("email", &body.email)?;

    let record = UserRecord {
        user_name: body.user_name,
        password: body.password,
        phone: body.phone,
        email: body.email,
        ..UserRecord::default()
    };
    let user = state.users.register(&state.hooks, record).await?;

    Ok((StatusCode::CREATED, ApiResponse::ok(user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub user_name: String,
    pub password: String,
    /// Captcha answer.
    pub code: String,
    /// Id the captcha was issued for.
    pub sid: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /api/login - Check captcha and credentials, then open a session.
///
/// The session id is returned both as a cookie and as a bearer token. Any
/// session presented with the request is destroyed first.
pub async fn login(
    State(state): State<AppState>,
    PresentedSessionId(previous): PresentedSessionId,
    jar: CookieJar,
    Json(body): Json<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<LoginResponse>>), AppError> {
    required("userName", &body.user_name)?;
    required("code", &body.code)?;
    required("sid", &body.sid)?;

    match state.captcha.verify(&body.sid, &body.code).await? {
        CaptchaCheck::Valid => {}
        CaptchaCheck::Missing => return Err(ApiError::CaptchaInvalid.into()),
        CaptchaCheck::Mismatch => return Err(ApiError::CaptchaMismatch.into()),
    }

    let user = state
        .users
        .find_by_name(&body.user_name)
        .await
        .ok_or(ApiError::UserNotExist)?;
    if !user.password_matches(&body.password) {
        tracing::warn!(user_name = %user.user_name, "Wrong password");
        return Err(ApiError::UserOrPassword.into());
    }
    let session = user
        .session()
        .ok_or_else(|| anyhow::anyhow!("user {} has no id", user.user_name))?;

    if let Some(previous) = previous {
        if let Err(err) = state.sessions.destroy(&previous).await {
            tracing::warn!(error = %err, "Failed to destroy previous session");
        }
    }

    let ttl = state.config.session_ttl();
    let session_id = generate_session_id();
    let payload = SessionPayload::for_session(session.clone(), Utc::now());
    if !state.sessions.save(&session_id, &payload, ttl).await? {
        return Err(anyhow::anyhow!("session could not be stored").into());
    }

    let client_ip = context::client_ip()?;
    tracing::info!(user_id = session.user_id, %client_ip, "Login succeeded");
    context::set_session(Some(session))?;

    let cookie = Cookie::build((state.config.cookie_name.clone(), session_id.to_string()))
        .path("/")
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(ttl.as_secs() as i64))
        .build();

    Ok((
        jar.add(cookie),
        ApiResponse::ok(LoginResponse {
            token: session_id.to_string(),
        }),
    ))
}

fn clear_cookie(state: &AppState, jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(state.config.cookie_name.clone()).path("/"))
}

/// POST /api/logout - End the current session.
pub async fn logout(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    PresentedSessionId(session_id): PresentedSessionId,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<bool>>), AppError> {
    if let Some(id) = session_id {
        state.sessions.destroy(&id).await?;
    }
    context::set_session(None)?;

    tracing::warn!(
        user_id = session.user_id,
        user_name = %session.user.user_name,
        "Logout succeeded"
    );
    Ok((clear_cookie(&state, jar), ApiResponse::ok(true)))
}

#[derive(Debug, Serialize)]
pub struct LogoutAllResponse {
    /// Sessions recorded in the user's login index when it was cleared.
    ///
    /// The index can miss a session opened by a racing login, so this may
    /// differ from the number of sessions that were actually live.
    pub sessions: usize,
}

/// POST /api/logout-all - End every session of the current user.
pub async fn logout_all(
    State(state): State<AppState>,
    CurrentSession(session): CurrentSession,
    jar: CookieJar,
) -> Result<(CookieJar, Json<ApiResponse<LogoutAllResponse>>), AppError> {
    let sessions = state.sessions.destroy_all_for(session.user_id).await?;
    context::set_session(None)?;

    Ok((
        clear_cookie(&state, jar),
        ApiResponse::ok(LogoutAllResponse { sessions }),
    ))
}

/// GET /api/me - Session of the current user.
pub async fn me(CurrentSession(session): CurrentSession) -> ApiResult<Session> {
    Ok(ApiResponse::ok(session))
}
