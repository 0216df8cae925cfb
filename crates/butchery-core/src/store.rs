//! Store contracts consumed by the auth orchestrator
//!
//! All durable state lives behind these traits. Cross-request consistency
//! (email uniqueness, refresh-token hash uniqueness) is the store's job and
//! is reported through [`StoreError::Conflict`].

use crate::{Admin, Customer, Email, RefreshToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("stored record is invalid: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// Administrator lookup
#[async_trait]
pub trait AdminStore: Send + Sync {
    async fn find_by_email(&self, email: &Email) -> Result<Admin, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Admin, StoreError>;

    /// Insert an administrator (seeding only)
    async fn save(&self, admin: &Admin) -> Result<(), StoreError>;
}

/// Customer persistence
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn find_by_email(&self, email: &Email) -> Result<Customer, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Customer, StoreError>;

    async fn exists_by_email(&self, email: &Email) -> Result<bool, StoreError>;

    /// Insert a new customer
    ///
    /// Returns [`StoreError::Conflict`] if the email is already taken, even
    /// when a concurrent registration won the race after `exists_by_email`.
    async fn save(&self, customer: &Customer) -> Result<(), StoreError>;
}

/// Refresh token persistence keyed by the secret's hash
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn save(&self, token: &RefreshToken) -> Result<(), StoreError>;

    async fn find_by_hash(&self, token_hash: &str) -> Result<RefreshToken, StoreError>;

    /// Delete one token; [`StoreError::NotFound`] if no row matched
    async fn delete_by_hash(&self, token_hash: &str) -> Result<(), StoreError>;

    /// Delete every token of a subject, returning how many were removed
    async fn delete_by_subject(&self, subject_id: Uuid) -> Result<u64, StoreError>;

    /// Delete tokens with `expires_at <= now`, returning how many were removed
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Cheap connectivity check used by the readiness probe
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
