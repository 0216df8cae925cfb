//! In-memory store
//!
//! Implements every store contract on top of `tokio::sync::RwLock`-guarded
//! maps. Used by tests and by the server's `--in-memory` development mode.
//! Uniqueness checks happen under the write lock, so concurrent inserts with
//! the same key resolve to exactly one winner, like a unique index would.

use crate::store::{AdminStore, CustomerStore, RefreshTokenStore, StoreError};
use crate::{Admin, Customer, Email, RefreshToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct MemoryStore {
    admins: RwLock<HashMap<Uuid, Admin>>,
    customers: RwLock<HashMap<Uuid, Customer>>,
    /// Keyed by token hash
    refresh_tokens: RwLock<HashMap<String, RefreshToken>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored refresh tokens (test helper)
    pub async fn refresh_token_count(&self) -> usize {
        self.refresh_tokens.read().await.len()
    }
}

#[async_trait]
impl AdminStore for MemoryStore {
    async fn find_by_email(&self, email: &Email) -> Result<Admin, StoreError> {
        self.admins
            .read()
            .await
            .values()
            .find(|a| &a.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Admin, StoreError> {
        self.admins
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn save(&self, admin: &Admin) -> Result<(), StoreError> {
        let mut admins = self.admins.write().await;
        if admins.values().any(|a| a.email == admin.email) {
            return Err(StoreError::Conflict(format!("admin email {}", admin.email)));
        }
        admins.insert(admin.id, admin.clone());
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for MemoryStore {
    async fn find_by_email(&self, email: &Email) -> Result<Customer, StoreError> {
        self.customers
            .read()
            .await
            .values()
            .find(|c| &c.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Customer, StoreError> {
        self.customers
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn exists_by_email(&self, email: &Email) -> Result<bool, StoreError> {
        Ok(self
            .customers
            .read()
            .await
            .values()
            .any(|c| &c.email == email))
    }

    async fn save(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut customers = self.customers.write().await;
        if customers.values().any(|c| c.email == customer.email) {
            return Err(StoreError::Conflict(format!(
                "customer email {}",
                customer.email
            )));
        }
        customers.insert(customer.id, customer.clone());
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryStore {
    async fn save(&self, token: &RefreshToken) -> Result<(), StoreError> {
        let mut tokens = self.refresh_tokens.write().await;
        if tokens.contains_key(&token.token_hash) {
            return Err(StoreError::Conflict("refresh token hash".to_string()));
        }
        tokens.insert(token.token_hash.clone(), token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<RefreshToken, StoreError> {
        self.refresh_tokens
            .read()
            .await
            .get(token_hash)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<(), StoreError> {
        self.refresh_tokens
            .write()
            .await
            .remove(token_hash)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn delete_by_subject(&self, subject_id: Uuid) -> Result<u64, StoreError> {
        let mut tokens = self.refresh_tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| t.subject_id != subject_id);
        Ok((before - tokens.len()) as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut tokens = self.refresh_tokens.write().await;
        let before = tokens.len();
        tokens.retain(|_, t| !t.is_expired_at(now));
        Ok((before - tokens.len()) as u64)
    }
}
