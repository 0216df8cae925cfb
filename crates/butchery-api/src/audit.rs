//! Security audit logging for authentication events
//!
//! Every login, registration, refresh and logout outcome is emitted at INFO
//! level with the `"audit"` target, so operators can route them separately:
//!
//! ```text
//! RUST_LOG=info,audit=info butchery-api
//! ```
//!
//! Failure reasons recorded here are internal. In particular a failed login
//! records whether the email was unknown or the password wrong, while the
//! client only ever sees "invalid credentials".

use axum::http::HeaderMap;
use butchery_core::SubjectKind;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Security audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    LoginSuccess {
        subject_id: Uuid,
        subject_type: SubjectKind,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    LoginFailure {
        subject_type: SubjectKind,
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationSuccess {
        customer_id: Uuid,
        email: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    RegistrationFailure {
        email: String,
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    TokenRefresh {
        subject_id: Uuid,
        subject_type: SubjectKind,
        ip_address: Option<String>,
    },

    RefreshFailure {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    Logout {
        subject_id: Option<Uuid>,
        subject_type: Option<SubjectKind>,
        ip_address: Option<String>,
    },

    /// Invalid, expired or malformed access token presented
    InvalidToken {
        reason: String,
        ip_address: Option<String>,
        user_agent: Option<String>,
    },

    /// Authenticated subject of the wrong kind
    AccessDenied {
        subject_id: Uuid,
        subject_type: SubjectKind,
        required: SubjectKind,
        resource: String,
        ip_address: Option<String>,
    },
}

impl AuditEvent {
    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::TokenRefresh { .. } => "Token refresh",
            AuditEvent::RefreshFailure { .. } => "Token refresh failed",
            AuditEvent::Logout { .. } => "Logout",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::AccessDenied { .. } => "Access denied",
        }
    }
}

/// Request metadata attached to audit events
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditContext {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ip_address: extract_ip_address(headers),
            user_agent: extract_user_agent(headers),
        }
    }
}

/// Log a security audit event
///
/// The whole event is serialized to JSON in the `event` field; the most
/// useful keys are repeated as structured fields for filtering.
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();
    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));
    let message = event.summary();

    match event {
        AuditEvent::LoginSuccess {
            subject_id,
            subject_type,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                subject_id = %subject_id,
                subject_type = %subject_type,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::LoginFailure {
            subject_type,
            reason,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                subject_type = %subject_type,
                reason = %reason,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::RegistrationSuccess {
            customer_id,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                subject_id = %customer_id,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::RegistrationFailure {
            reason, ip_address, ..
        }
        | AuditEvent::RefreshFailure {
            reason, ip_address, ..
        }
        | AuditEvent::InvalidToken {
            reason, ip_address, ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                reason = %reason,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::TokenRefresh {
            subject_id,
            subject_type,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                subject_id = %subject_id,
                subject_type = %subject_type,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::Logout {
            subject_id,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                subject_id = ?subject_id,
                ip_address = ?ip_address,
                "{message}"
            );
        }
        AuditEvent::AccessDenied {
            subject_id,
            required,
            resource,
            ip_address,
            ..
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                subject_id = %subject_id,
                required = %required,
                resource = %resource,
                ip_address = ?ip_address,
                "{message}"
            );
        }
    }
}

/// Extract the client IP from proxy headers
///
/// Checks `X-Forwarded-For` (first hop) and then `X-Real-IP`.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    if let Some(xff) = headers.get("x-forwarded-for") {
        if let Ok(xff_str) = xff.to_str() {
            if let Some(first_ip) = xff_str.split(',').next() {
                let first_ip = first_ip.trim();
                if !first_ip.is_empty() {
                    return Some(first_ip.to_string());
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
