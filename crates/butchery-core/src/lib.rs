//! Butchery Core - Domain models, store contracts, and shared types
//!
//! This crate defines the core abstractions used by the auth service:
//! - Subject kinds (administrators and customers) and their records
//! - Customer value objects (email, password policy, phone number)
//! - The refresh token entity and its expiry rules
//! - Store traits consumed by the auth orchestrator
//! - PostgreSQL and in-memory store implementations
//! - Clock abstraction and configuration management

pub mod admin;
pub mod clock;
pub mod config;
pub mod customer;
pub mod memory;
pub mod postgres;
pub mod refresh_token;
pub mod store;

pub use admin::Admin;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, ServerConfig};
pub use customer::{validate_password, Customer, Email, PhoneNumber, MIN_PASSWORD_LENGTH};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use refresh_token::{RefreshToken, RefreshTokenError, REFRESH_TOKEN_TTL_DAYS};
pub use store::{AdminStore, CustomerStore, RefreshTokenStore, StoreError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Field-level registration failures
///
/// These are surfaced individually to the caller: the account does not exist
/// yet, so there is nothing to enumerate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid email format")]
    InvalidEmail,

    #[error("password must be at least 8 characters")]
    PasswordTooShort,

    #[error("phone number must not be empty")]
    InvalidPhoneNumber,

    #[error("full name must not be empty")]
    EmptyName,
}

/// Returned when a stored or presented subject kind is neither admin nor customer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("subject type must be 'admin' or 'customer', got '{0}'")]
pub struct InvalidSubjectKind(pub String);

// ============================================================================
// Subjects
// ============================================================================

/// The two kinds of authenticated subject
///
/// The set is closed: tokens and stored sessions only ever carry one of
/// these two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Admin,
    Customer,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Admin => "admin",
            SubjectKind::Customer => "customer",
        }
    }
}

impl std::fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubjectKind {
    type Err = InvalidSubjectKind;

    /// Exact match only; `"Admin"` is not a valid wire value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(SubjectKind::Admin),
            "customer" => Ok(SubjectKind::Customer),
            other => Err(InvalidSubjectKind(other.to_string())),
        }
    }
}

/// Minimal projection of a subject carried by tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectRef {
    pub id: Uuid,
    pub kind: SubjectKind,
}

impl SubjectRef {
    pub fn new(id: Uuid, kind: SubjectKind) -> Self {
        Self { id, kind }
    }

    pub fn admin(id: Uuid) -> Self {
        Self::new(id, SubjectKind::Admin)
    }

    pub fn customer(id: Uuid) -> Self {
        Self::new(id, SubjectKind::Customer)
    }
}
