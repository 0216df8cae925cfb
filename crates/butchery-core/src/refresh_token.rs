//! Refresh token entity
//!
//! A refresh token is a long-lived session credential. Only a one-way hash of
//! the opaque secret is kept; the raw secret is handed to the client once at
//! login and never stored.
//!
//! Lifecycle:
//! - Active: created at login, not yet expired, still stored
//! - Expired: `now >= expires_at`; detected lazily when the token is used
//! - Revoked: deleted from the store (logout, or bulk per subject)

use crate::{SubjectKind, SubjectRef};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Fixed refresh-token lifetime, independent of the access-token TTL
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 7;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RefreshTokenError {
    #[error("token hash must not be empty")]
    EmptyTokenHash,
}

/// Persisted refresh token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub subject_id: Uuid,
    pub subject_kind: SubjectKind,
    /// SHA-256 of the raw secret, lowercase hex
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Create a token for `subject` expiring [`REFRESH_TOKEN_TTL_DAYS`] after `now`
    pub fn new(
        subject: SubjectRef,
        token_hash: String,
        now: DateTime<Utc>,
    ) -> Result<Self, RefreshTokenError> {
        if token_hash.is_empty() {
            return Err(RefreshTokenError::EmptyTokenHash);
        }

        Ok(Self {
            id: Uuid::new_v4(),
            subject_id: subject.id,
            subject_kind: subject.kind,
            token_hash,
            expires_at: now + Self::ttl(),
            created_at: now,
        })
    }

    /// Rebuild a token read back from storage (no invariant checks)
    pub fn restore(
        id: Uuid,
        subject_id: Uuid,
        subject_kind: SubjectKind,
        token_hash: String,
        expires_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subject_id,
            subject_kind,
            token_hash,
            expires_at,
            created_at,
        }
    }

    pub fn ttl() -> Duration {
        Duration::days(REFRESH_TOKEN_TTL_DAYS)
    }

    pub fn subject(&self) -> SubjectRef {
        SubjectRef::new(self.subject_id, self.subject_kind)
    }

    /// A token expiring at `T` is already invalid when checked at `T`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
