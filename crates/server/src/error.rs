//! HTTP error handling and the JSON response envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use reqscope_core::context::{self, ScopeError};
use reqscope_core::kv::KvError;

use crate::users::RegisterError;

/// Envelope wrapping every JSON response.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
    pub request_id: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            code: 0,
            message: "success".to_string(),
            data,
            request_id: current_request_id(),
        })
    }
}

fn current_request_id() -> Option<String> {
    context::try_current().map(|ctx| ctx.request_id().to_string())
}

/// Failures a client is told about.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not logged in")]
    NoLogin,
    #[error("administrator access required")]
    NotAuth,
    #[error("captcha expired or was never issued")]
    CaptchaInvalid,
    #[error("captcha does not match")]
    CaptchaMismatch,
    #[error("user already exists")]
    UserExisted,
    #[error("user does not exist")]
    UserNotExist,
    #[error("wrong user name or password")]
    UserOrPassword,
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NoLogin | ApiError::UserOrPassword => StatusCode::UNAUTHORIZED,
            ApiError::NotAuth => StatusCode::FORBIDDEN,
            ApiError::UserExisted => StatusCode::CONFLICT,
            ApiError::UserNotExist => StatusCode::NOT_FOUND,
            ApiError::CaptchaInvalid | ApiError::CaptchaMismatch | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            ApiError::NoLogin => 10001,
            ApiError::NotAuth => 10002,
            ApiError::CaptchaInvalid => 20001,
            ApiError::CaptchaMismatch => 20002,
            ApiError::UserExisted => 20003,
            ApiError::UserNotExist => 20004,
            ApiError::UserOrPassword => 20005,
            ApiError::BadRequest(_) => 40000,
        }
    }
}

impl From<RegisterError> for AppError {
    fn from(err: RegisterError) -> Self {
        match err {
            RegisterError::Exists(_) => Self(ApiError::UserExisted.into()),
            RegisterError::Store(err) => Self(err.into()),
        }
    }
}

/// Application error type that wraps `anyhow::Error`.
///
/// Handlers use `?` on anything convertible into `anyhow::Error`; the
/// response is derived from the concrete error underneath.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    fn status_and_code(&self) -> (StatusCode, i32, String) {
        if let Some(api) = self.0.downcast_ref::<ApiError>() {
            return (api.status(), api.code(), api.to_string());
        }

        if let Some(kv) = self.0.downcast_ref::<KvError>() {
            tracing::error!(error = %kv, "Key/value store error");
            return if kv.is_unavailable() {
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    50001,
                    "Storage temporarily unavailable".to_string(),
                )
            } else {
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    50000,
                    "Internal server error".to_string(),
                )
            };
        }

        if self.0.downcast_ref::<ScopeError>().is_some() {
            tracing::error!(error = %self.0, "Handler ran outside a request scope");
        } else {
            tracing::error!(error = %self.0, "Application error");
        }
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            50000,
            "Internal server error".to_string(),
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.status_and_code();
        let body = ApiResponse {
            code,
            message,
            data: serde_json::Value::Null,
            request_id: current_request_id(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        Self(err.into())
    }
}

impl From<KvError> for AppError {
    fn from(err: KvError) -> Self {
        Self(err.into())
    }
}

impl From<ScopeError> for AppError {
    fn from(err: ScopeError) -> Self {
        Self(err.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}
