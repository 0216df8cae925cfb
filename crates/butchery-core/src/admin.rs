//! Administrator record
//!
//! Administrators are provisioned out-of-band (see the `seed-admin` CLI
//! command); the service itself only looks them up.

use crate::{customer::Email, ValidationError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Back-office administrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Admin {
    pub id: Uuid,
    pub email: Email,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
}

impl Admin {
    pub fn new(
        id: Uuid,
        email: &str,
        password_hash: String,
        full_name: &str,
    ) -> Result<Self, ValidationError> {
        let email = Email::parse(email)?;
        if full_name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }

        Ok(Self {
            id,
            email,
            password_hash,
            full_name: full_name.to_string(),
        })
    }
}
