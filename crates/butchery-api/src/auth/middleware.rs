//! Bearer token authentication for protected routes
//!
//! [`auth_middleware`] validates the `Authorization: Bearer <jwt>` header and
//! stores an [`AuthenticatedSubject`] in the request extensions.
//! [`require_admin`] and [`require_customer`] must run after it and reject
//! subjects of the other kind with 403.

use crate::audit::{audit_log, extract_ip_address, extract_user_agent, AuditEvent};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use butchery_core::{SubjectKind, SubjectRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Subject extracted from a valid access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuthenticatedSubject {
    pub subject_id: Uuid,
    #[schema(value_type = String, example = "customer")]
    pub subject_type: SubjectKind,
}

impl AuthenticatedSubject {
    pub fn subject(&self) -> SubjectRef {
        SubjectRef::new(self.subject_id, self.subject_type)
    }
}

impl From<SubjectRef> for AuthenticatedSubject {
    fn from(subject: SubjectRef) -> Self {
        Self {
            subject_id: subject.id,
            subject_type: subject.kind,
        }
    }
}

/// Authentication middleware rejections
#[derive(Debug, Error)]
pub enum AuthRejection {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Subject kind not allowed")]
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AuthRejection::Forbidden => (StatusCode::FORBIDDEN, ApiError::forbidden()),
            _ => (StatusCode::UNAUTHORIZED, ApiError::unauthorized("unauthorized")),
        };

        (status, Json(body)).into_response()
    }
}

fn bearer_token(request: &Request) -> Result<&str, AuthRejection> {
    let value = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthRejection::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthRejection::InvalidAuthHeader)?;

    value
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or(AuthRejection::InvalidAuthHeader)
}

/// Require a valid access token
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let token = match bearer_token(&request) {
        Ok(token) => token,
        Err(rejection) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: rejection.to_string(),
                ip_address: extract_ip_address(request.headers()),
                user_agent: extract_user_agent(request.headers()),
            });
            return Err(rejection);
        }
    };

    let subject = match state.tokens.validate_access_token(token) {
        Ok(subject) => subject,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: e.to_string(),
                ip_address: extract_ip_address(request.headers()),
                user_agent: extract_user_agent(request.headers()),
            });
            return Err(AuthRejection::InvalidToken);
        }
    };

    request
        .extensions_mut()
        .insert(AuthenticatedSubject::from(subject));

    Ok(next.run(request).await)
}

/// Allow only administrators; must be layered inside [`auth_middleware`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AuthRejection> {
    require_kind(SubjectKind::Admin, request, next).await
}

/// Allow only customers; must be layered inside [`auth_middleware`]
pub async fn require_customer(request: Request, next: Next) -> Result<Response, AuthRejection> {
    require_kind(SubjectKind::Customer, request, next).await
}

async fn require_kind(
    required: SubjectKind,
    request: Request,
    next: Next,
) -> Result<Response, AuthRejection> {
    let subject = *request
        .extensions()
        .get::<AuthenticatedSubject>()
        .ok_or(AuthRejection::MissingAuthHeader)?;

    if subject.subject_type != required {
        audit_log(&AuditEvent::AccessDenied {
            subject_id: subject.subject_id,
            subject_type: subject.subject_type,
            required,
            resource: request.uri().path().to_string(),
            ip_address: extract_ip_address(request.headers()),
        });
        return Err(AuthRejection::Forbidden);
    }

    Ok(next.run(request).await)
}
