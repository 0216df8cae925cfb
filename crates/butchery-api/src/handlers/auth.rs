//! Authentication API handlers
//!
//! Request bodies are rejected with 400 when they are not JSON objects or
//! when a required field is missing or empty. Everything else is decided by
//! [`AuthService`](crate::auth::AuthService).

use crate::audit::AuditContext;
use crate::auth::{AuthenticatedSubject, Registration};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use butchery_core::SubjectKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

pub const TOKEN_TYPE: &str = "Bearer";

/// Customer registration request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub password: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub full_name: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub phone: String,
}

/// Login request, shared by admins and customers
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1))]
    pub password: String,
}

/// Body of both refresh and logout
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RefreshResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
}

/// Register a new customer account
///
/// Field checks run in order: email format, password length, phone, email
/// uniqueness, full name. The first failure is reported.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Customer registered", body = RegisterResponse),
        (status = 400, description = "Missing fields", body = crate::error::ApiError),
        (status = 409, description = "Email already exists", body = crate::error::ApiError),
        (status = 422, description = "Invalid field value", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    request
        .validate()
        .map_err(|_| AppError::BadRequest("all fields are required".to_string()))?;

    let result = state
        .auth
        .register(
            Registration {
                email: request.email,
                password: request.password,
                full_name: request.full_name,
                phone: request.phone,
            },
            &AuditContext::from_headers(&headers),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            id: result.id,
            email: result.email,
            full_name: result.full_name,
        }),
    ))
}

/// Customer login
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing fields", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn customer_login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    login(SubjectKind::Customer, &state, &headers, payload).await
}

/// Administrator login
#[utoipa::path(
    post,
    path = "/api/v1/admin/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing fields", body = crate::error::ApiError),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn admin_login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    login(SubjectKind::Admin, &state, &headers, payload).await
}

async fn login(
    kind: SubjectKind,
    state: &AppState,
    headers: &HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(request) = payload?;
    request
        .validate()
        .map_err(|_| AppError::BadRequest("email and password are required".to_string()))?;

    let result = state
        .auth
        .login(
            kind,
            &request.email,
            &request.password,
            &AuditContext::from_headers(headers),
        )
        .await?;

    Ok(Json(LoginResponse {
        access_token: result.access_token,
        refresh_token: result.refresh_token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: result.expires_in,
    }))
}

/// Exchange a refresh token for a new access token
///
/// The refresh token is not rotated and stays valid until it expires or is
/// revoked by logout.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Access token issued", body = RefreshResponse),
        (status = 400, description = "Missing refresh token", body = crate::error::ApiError),
        (status = 401, description = "Invalid or expired refresh token", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    request
        .validate()
        .map_err(|_| AppError::BadRequest("refresh_token is required".to_string()))?;

    let result = state
        .auth
        .refresh(&request.refresh_token, &AuditContext::from_headers(&headers))
        .await?;

    Ok(Json(RefreshResponse {
        access_token: result.access_token,
        token_type: TOKEN_TYPE.to_string(),
        expires_in: result.expires_in,
    }))
}

/// Revoke a refresh token
///
/// Succeeds for unknown or already revoked tokens.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 204, description = "Logged out"),
        (status = 400, description = "Missing refresh token", body = crate::error::ApiError),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(subject): Extension<AuthenticatedSubject>,
    headers: HeaderMap,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    request
        .validate()
        .map_err(|_| AppError::BadRequest("refresh_token is required".to_string()))?;

    state
        .auth
        .logout(
            &request.refresh_token,
            Some(subject.subject()),
            &AuditContext::from_headers(&headers),
        )
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Identity carried by the presented access token
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Authenticated subject", body = AuthenticatedSubject),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(Extension(subject): Extension<AuthenticatedSubject>) -> Json<AuthenticatedSubject> {
    Json(subject)
}

#[utoipa::path(
    get,
    path = "/api/v1/admin/whoami",
    tag = "admin",
    responses(
        (status = 200, description = "Authenticated administrator", body = AuthenticatedSubject),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Not an administrator", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn admin_whoami_handler(
    Extension(subject): Extension<AuthenticatedSubject>,
) -> Json<AuthenticatedSubject> {
    Json(subject)
}

#[utoipa::path(
    get,
    path = "/api/v1/customer/whoami",
    tag = "customer",
    responses(
        (status = 200, description = "Authenticated customer", body = AuthenticatedSubject),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 403, description = "Not a customer", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn customer_whoami_handler(
    Extension(subject): Extension<AuthenticatedSubject>,
) -> Json<AuthenticatedSubject> {
    Json(subject)
}
