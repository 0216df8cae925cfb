//! PostgreSQL store
//!
//! Implements the admin, customer and refresh-token contracts using SQLx.
//! Email uniqueness and token-hash uniqueness are enforced by unique indexes
//! (see `migrations/`); violations are reported as [`StoreError::Conflict`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::store::{AdminStore, CustomerStore, RefreshTokenStore, StoreError};
use crate::{Admin, Customer, Email, PhoneNumber, RefreshToken, SubjectKind};

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new connection pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("migration failed: {e}")))
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::RowNotFound => StoreError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.constraint().unwrap_or("unique").to_string())
        }
        other => StoreError::Database(other.to_string()),
    }
}

/// Admin row from database
#[derive(Debug, FromRow)]
struct AdminRow {
    id: Uuid,
    email: String,
    password_hash: String,
    full_name: String,
}

impl TryFrom<AdminRow> for Admin {
    type Error = StoreError;

    fn try_from(row: AdminRow) -> Result<Self, Self::Error> {
        Ok(Admin {
            id: row.id,
            email: Email::parse(&row.email).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            password_hash: row.password_hash,
            full_name: row.full_name,
        })
    }
}

/// Customer row from database
#[derive(Debug, FromRow)]
struct CustomerRow {
    id: Uuid,
    email: String,
    password_hash: String,
    full_name: String,
    phone_number: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CustomerRow> for Customer {
    type Error = StoreError;

    fn try_from(row: CustomerRow) -> Result<Self, Self::Error> {
        let corrupt = |e: crate::ValidationError| StoreError::Corrupt(e.to_string());
        Ok(Customer {
            id: row.id,
            email: Email::parse(&row.email).map_err(corrupt)?,
            password_hash: row.password_hash,
            full_name: row.full_name,
            phone: PhoneNumber::parse(&row.phone_number).map_err(corrupt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Refresh token row from database
#[derive(Debug, FromRow)]
struct RefreshTokenRow {
    id: Uuid,
    subject_id: Uuid,
    subject_type: String,
    token_hash: String,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RefreshTokenRow> for RefreshToken {
    type Error = StoreError;

    fn try_from(row: RefreshTokenRow) -> Result<Self, Self::Error> {
        let kind: SubjectKind = row
            .subject_type
            .parse()
            .map_err(|e: crate::InvalidSubjectKind| StoreError::Corrupt(e.to_string()))?;

        Ok(RefreshToken::restore(
            row.id,
            row.subject_id,
            kind,
            row.token_hash,
            row.expires_at,
            row.created_at,
        ))
    }
}

#[async_trait]
impl AdminStore for PgStore {
    async fn find_by_email(&self, email: &Email) -> Result<Admin, StoreError> {
        let row = sqlx::query_as::<_, AdminRow>(
            "SELECT id, email, password_hash, full_name FROM admins WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Admin, StoreError> {
        let row = sqlx::query_as::<_, AdminRow>(
            "SELECT id, email, password_hash, full_name FROM admins WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;

        row.try_into()
    }

    async fn save(&self, admin: &Admin) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO admins (id, email, password_hash, full_name) VALUES ($1, $2, $3, $4)")
            .bind(admin.id)
            .bind(admin.email.as_str())
            .bind(&admin.password_hash)
            .bind(&admin.full_name)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[async_trait]
impl CustomerStore for PgStore {
    async fn find_by_email(&self, email: &Email) -> Result<Customer, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, email, password_hash, full_name, phone_number, created_at, updated_at FROM customers WHERE email = $1",
        )
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Customer, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT id, email, password_hash, full_name, phone_number, created_at, updated_at FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;

        row.try_into()
    }

    async fn exists_by_email(&self, email: &Email) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM customers WHERE email = $1)")
            .bind(email.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn save(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customers (id, email, password_hash, full_name, phone_number, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(customer.id)
        .bind(customer.email.as_str())
        .bind(&customer.password_hash)
        .bind(&customer.full_name)
        .bind(customer.phone.as_str())
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn save(&self, token: &RefreshToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, subject_id, subject_type, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id)
        .bind(token.subject_id)
        .bind(token.subject_kind.as_str())
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> Result<RefreshToken, StoreError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, subject_id, subject_type, token_hash, expires_at, created_at FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(StoreError::NotFound)?;

        row.try_into()
    }

    async fn delete_by_hash(&self, token_hash: &str) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_by_subject(&self, subject_id: Uuid) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE subject_id = $1")
            .bind(subject_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}
