//! API error handling
//!
//! Every error leaves the server as an [`ApiError`] JSON body. Internal
//! failures are logged where they happen and reach the client without
//! details.

use crate::auth::AuthError;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden() -> Self {
        Self::new("FORBIDDEN", "forbidden")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Auth(AuthError),
    BadRequest(String),
    /// Body that could not be deserialized; carries the extractor's reason
    MalformedBody(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::Auth(err) => auth_error_response(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::MalformedBody(reason) => (
                StatusCode::BAD_REQUEST,
                ApiError::bad_request("invalid request body").with_details(reason),
            ),
        };

        (status, Json(error)).into_response()
    }
}

fn auth_error_response(err: AuthError) -> (StatusCode, ApiError) {
    match err {
        AuthError::InvalidCredentials => (
            StatusCode::UNAUTHORIZED,
            ApiError::unauthorized("invalid credentials"),
        ),
        AuthError::Validation(v) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::new("VALIDATION_ERROR", v.to_string()),
        ),
        AuthError::EmailAlreadyExists => (
            StatusCode::CONFLICT,
            ApiError::new("CONFLICT", "email already exists"),
        ),
        AuthError::RefreshTokenNotFound | AuthError::RefreshTokenExpired => (
            StatusCode::UNAUTHORIZED,
            ApiError::unauthorized("invalid or expired refresh token"),
        ),
        // Already logged by the service
        AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, ApiError::internal_error()),
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Auth(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "rejected request body");
        AppError::MalformedBody(rejection.body_text())
    }
}
