//! Authentication service
//!
//! Composes the stores, password hasher and token service into the four use
//! cases: login (admin or customer), customer registration, access token
//! refresh and logout.
//!
//! Every store and hashing call is bounded by the configured operation
//! timeout. Ordering matters in two places:
//! - login persists the refresh token only after the access token has been
//!   signed, and returns nothing if persisting fails
//! - registration validates email, password, phone, then uniqueness, then
//!   name, stopping at the first failure

use super::jwt::{hash_refresh_secret, issue_refresh_secret, TokenService};
use super::password::{PasswordError, PasswordHasher};
use crate::audit::{audit_log, AuditContext, AuditEvent};
use butchery_core::{
    validate_password, AdminStore, Clock, Customer, CustomerStore, Email, PhoneNumber,
    RefreshToken, RefreshTokenStore, StoreError, SubjectKind, SubjectRef, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// Errors returned by [`AuthService`]
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown email or wrong password; the two are never distinguished
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("email already exists")]
    EmailAlreadyExists,

    #[error("refresh token not found")]
    RefreshTokenNotFound,

    #[error("refresh token expired")]
    RefreshTokenExpired,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Why a login was rejected; logged, never returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginRejection {
    UnknownEmail,
    PasswordMismatch,
}

impl LoginRejection {
    fn as_str(self) -> &'static str {
        match self {
            LoginRejection::UnknownEmail => "unknown email",
            LoginRejection::PasswordMismatch => "password mismatch",
        }
    }
}

enum LoginFailure {
    Rejected(LoginRejection),
    Internal(String),
}

impl From<AuthError> for LoginFailure {
    fn from(err: AuthError) -> Self {
        LoginFailure::Internal(err.to_string())
    }
}

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResult {
    pub access_token: String,
    /// Raw refresh secret; returned once and never stored
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Successful registration
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegisterResult {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
}

/// Successful refresh
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefreshResult {
    pub access_token: String,
    pub expires_in: u64,
}

/// Customer registration input
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: String,
}

/// Authentication orchestrator
#[derive(Clone)]
pub struct AuthService {
    admins: Arc<dyn AdminStore>,
    customers: Arc<dyn CustomerStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<TokenService>,
    clock: Arc<dyn Clock>,
    operation_timeout: Duration,
}

impl AuthService {
    pub fn new(
        admins: Arc<dyn AdminStore>,
        customers: Arc<dyn CustomerStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<TokenService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            admins,
            customers,
            refresh_tokens,
            hasher,
            tokens,
            clock,
            operation_timeout: Duration::from_secs(10),
        }
    }

    /// Upper bound for each individual store or hashing call
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn token_service(&self) -> &TokenService {
        &self.tokens
    }

    /// Authenticate a subject of `kind` and open a new session
    pub async fn login(
        &self,
        kind: SubjectKind,
        email: &str,
        password: &str,
        ctx: &AuditContext,
    ) -> Result<LoginResult, AuthError> {
        let subject = match self.authenticate(kind, email, password).await {
            Ok(subject) => subject,
            Err(LoginFailure::Rejected(rejection)) => {
                tracing::debug!(subject_type = %kind, reason = rejection.as_str(), "login rejected");
                audit_log(&AuditEvent::LoginFailure {
                    subject_type: kind,
                    email: email.to_string(),
                    reason: rejection.as_str().to_string(),
                    ip_address: ctx.ip_address.clone(),
                    user_agent: ctx.user_agent.clone(),
                });
                return Err(AuthError::InvalidCredentials);
            }
            Err(LoginFailure::Internal(message)) => {
                tracing::error!(subject_type = %kind, error = %message, "login failed");
                return Err(AuthError::Internal(message));
            }
        };

        let result = self.open_session(subject).await.map_err(|e| {
            tracing::error!(subject_type = %kind, error = %e, "login failed");
            e
        })?;

        audit_log(&AuditEvent::LoginSuccess {
            subject_id: subject.id,
            subject_type: kind,
            email: email.to_string(),
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
        });

        Ok(result)
    }

    async fn authenticate(
        &self,
        kind: SubjectKind,
        email: &str,
        password: &str,
    ) -> Result<SubjectRef, LoginFailure> {
        // A malformed email cannot belong to any account
        let email = Email::parse(email)
            .map_err(|_| LoginFailure::Rejected(LoginRejection::UnknownEmail))?;

        let (subject, password_hash) = match kind {
            SubjectKind::Admin => self
                .within("admin lookup", self.admins.find_by_email(&email))
                .await?
                .map(|admin| (SubjectRef::admin(admin.id), admin.password_hash)),
            SubjectKind::Customer => self
                .within("customer lookup", self.customers.find_by_email(&email))
                .await?
                .map(|customer| (SubjectRef::customer(customer.id), customer.password_hash)),
        }
        .map_err(|e| match e {
            StoreError::NotFound => LoginFailure::Rejected(LoginRejection::UnknownEmail),
            other => LoginFailure::Internal(other.to_string()),
        })?;

        self.within("password verify", self.hasher.verify(&password_hash, password))
            .await?
            .map_err(|e| match e {
                PasswordError::Mismatch => LoginFailure::Rejected(LoginRejection::PasswordMismatch),
                other => LoginFailure::Internal(other.to_string()),
            })?;

        Ok(subject)
    }

    async fn open_session(&self, subject: SubjectRef) -> Result<LoginResult, AuthError> {
        let access_token = self
            .tokens
            .issue_access_token(subject)
            .map_err(|e| internal("sign access token", e))?;

        let refresh_secret = issue_refresh_secret().map_err(|e| internal("refresh secret", e))?;
        let token = RefreshToken::new(subject, hash_refresh_secret(&refresh_secret), self.clock.now())
            .map_err(|e| internal("refresh token", e))?;

        self.within("refresh token save", self.refresh_tokens.save(&token))
            .await?
            .map_err(|e| internal("refresh token save", e))?;

        Ok(LoginResult {
            access_token,
            refresh_token: refresh_secret,
            expires_in: self.tokens.access_ttl_secs(),
        })
    }

    /// Register a new customer
    pub async fn register(
        &self,
        registration: Registration,
        ctx: &AuditContext,
    ) -> Result<RegisterResult, AuthError> {
        let email_for_audit = registration.email.trim().to_lowercase();

        match self.register_customer(registration).await {
            Ok(result) => {
                audit_log(&AuditEvent::RegistrationSuccess {
                    customer_id: result.id,
                    email: result.email.clone(),
                    ip_address: ctx.ip_address.clone(),
                    user_agent: ctx.user_agent.clone(),
                });
                Ok(result)
            }
            Err(err) => {
                if let AuthError::Internal(message) = &err {
                    tracing::error!(error = %message, "registration failed");
                }
                audit_log(&AuditEvent::RegistrationFailure {
                    email: email_for_audit,
                    reason: err.to_string(),
                    ip_address: ctx.ip_address.clone(),
                    user_agent: ctx.user_agent.clone(),
                });
                Err(err)
            }
        }
    }

    async fn register_customer(&self, registration: Registration) -> Result<RegisterResult, AuthError> {
        let email = Email::parse(&registration.email)?;
        validate_password(&registration.password)?;
        let phone = PhoneNumber::parse(&registration.phone)?;

        let taken = self
            .within("customer exists", self.customers.exists_by_email(&email))
            .await?
            .map_err(|e| internal("customer exists", e))?;
        if taken {
            return Err(AuthError::EmailAlreadyExists);
        }

        let password_hash = self
            .within("password hash", self.hasher.hash(&registration.password))
            .await?
            .map_err(|e| internal("password hash", e))?;

        let customer = Customer::new(
            Uuid::new_v4(),
            email,
            password_hash,
            &registration.full_name,
            phone,
            self.clock.now(),
        )?;

        self.within("customer save", self.customers.save(&customer))
            .await?
            .map_err(|e| match e {
                // Lost the race against a concurrent registration
                StoreError::Conflict(_) => AuthError::EmailAlreadyExists,
                other => internal("customer save", other),
            })?;

        Ok(RegisterResult {
            id: customer.id,
            email: customer.email.into_inner(),
            full_name: customer.full_name,
        })
    }

    /// Exchange a refresh secret for a new access token
    ///
    /// The refresh token itself is left untouched and stays usable until it
    /// expires or is revoked.
    pub async fn refresh(&self, raw_secret: &str, ctx: &AuditContext) -> Result<RefreshResult, AuthError> {
        match self.refresh_access_token(raw_secret).await {
            Ok((subject, result)) => {
                audit_log(&AuditEvent::TokenRefresh {
                    subject_id: subject.id,
                    subject_type: subject.kind,
                    ip_address: ctx.ip_address.clone(),
                });
                Ok(result)
            }
            Err(err) => {
                if let AuthError::Internal(message) = &err {
                    tracing::error!(error = %message, "refresh failed");
                }
                audit_log(&AuditEvent::RefreshFailure {
                    reason: err.to_string(),
                    ip_address: ctx.ip_address.clone(),
                    user_agent: ctx.user_agent.clone(),
                });
                Err(err)
            }
        }
    }

    async fn refresh_access_token(
        &self,
        raw_secret: &str,
    ) -> Result<(SubjectRef, RefreshResult), AuthError> {
        let token_hash = hash_refresh_secret(raw_secret);

        let stored = self
            .within("refresh token lookup", self.refresh_tokens.find_by_hash(&token_hash))
            .await?
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::RefreshTokenNotFound,
                other => internal("refresh token lookup", other),
            })?;

        if stored.is_expired_at(self.clock.now()) {
            return Err(AuthError::RefreshTokenExpired);
        }

        let subject = stored.subject();
        let access_token = self
            .tokens
            .issue_access_token(subject)
            .map_err(|e| internal("sign access token", e))?;

        Ok((
            subject,
            RefreshResult {
                access_token,
                expires_in: self.tokens.access_ttl_secs(),
            },
        ))
    }

    /// Revoke a refresh token; unknown or already revoked secrets succeed
    pub async fn logout(
        &self,
        raw_secret: &str,
        subject: Option<SubjectRef>,
        ctx: &AuditContext,
    ) -> Result<(), AuthError> {
        let token_hash = hash_refresh_secret(raw_secret);

        match self
            .within("refresh token delete", self.refresh_tokens.delete_by_hash(&token_hash))
            .await?
        {
            Ok(()) | Err(StoreError::NotFound) => {}
            Err(other) => {
                let err = internal("refresh token delete", other);
                tracing::error!(error = %err, "logout failed");
                return Err(err);
            }
        }

        audit_log(&AuditEvent::Logout {
            subject_id: subject.map(|s| s.id),
            subject_type: subject.map(|s| s.kind),
            ip_address: ctx.ip_address.clone(),
        });

        Ok(())
    }

    /// Revoke every session of a subject, returning how many were removed
    pub async fn revoke_all_sessions(&self, subject_id: Uuid) -> Result<u64, AuthError> {
        self.within("refresh token bulk delete", self.refresh_tokens.delete_by_subject(subject_id))
            .await?
            .map_err(|e| internal("refresh token bulk delete", e))
    }

    async fn within<F: Future>(&self, operation: &'static str, fut: F) -> Result<F::Output, AuthError> {
        tokio::time::timeout(self.operation_timeout, fut)
            .await
            .map_err(|_| {
                tracing::error!(operation, timeout = ?self.operation_timeout, "operation timed out");
                AuthError::Internal(format!("{operation} timed out"))
            })
    }
}

fn internal(operation: &str, err: impl std::fmt::Display) -> AuthError {
    AuthError::Internal(format!("{operation}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtConfig;
    use crate::auth::password::{Argon2Hasher, PasswordConfig};
    use async_trait::async_trait;
    use butchery_core::{Admin, ManualClock, MemoryStore};
    use chrono::{DateTime, TimeZone, Utc};

    struct Harness {
        service: AuthService,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        hasher: Arc<Argon2Hasher>,
    }

    fn harness() -> Harness {
        let store = Arc::new(MemoryStore::new());
        harness_with(store.clone(), store.clone(), store)
    }

    fn harness_with(
        store: Arc<MemoryStore>,
        customers: Arc<dyn CustomerStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> Harness {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap(),
        ));
        let hasher = Arc::new(Argon2Hasher::new(PasswordConfig::insecure_fast()));
        let tokens = Arc::new(TokenService::new(
            JwtConfig {
                secret: "test-secret".to_string(),
                access_ttl_secs: 900,
                issuer: "butchery-app".to_string(),
            },
            clock.clone(),
        ));

        let service = AuthService::new(
            store.clone(),
            customers,
            refresh_tokens,
            hasher.clone(),
            tokens,
            clock.clone(),
        );

        Harness {
            service,
            store,
            clock,
            hasher,
        }
    }

    fn registration(email: &str, password: &str) -> Registration {
        Registration {
            email: email.to_string(),
            password: password.to_string(),
            full_name: "A".to_string(),
            phone: "+1".to_string(),
        }
    }

    fn ctx() -> AuditContext {
        AuditContext::default()
    }

    #[tokio::test]
    async fn test_full_session_scenario() {
        let h = harness();

        let registered = h
            .service
            .register(registration("a@b.com", "password123"), &ctx())
            .await
            .unwrap();
        assert_eq!(registered.email, "a@b.com");
        assert_eq!(registered.full_name, "A");

        let login = h
            .service
            .login(SubjectKind::Customer, "a@b.com", "password123", &ctx())
            .await
            .unwrap();
        assert!(!login.access_token.is_empty());
        assert!(!login.refresh_token.is_empty());
        assert!(login.expires_in > 0);

        let subject = h
            .service
            .token_service()
            .validate_access_token(&login.access_token)
            .unwrap();
        assert_eq!(subject, SubjectRef::customer(registered.id));

        let refreshed = h.service.refresh(&login.refresh_token, &ctx()).await.unwrap();
        assert!(!refreshed.access_token.is_empty());
        assert_eq!(refreshed.expires_in, 900);

        h.service.logout(&login.refresh_token, None, &ctx()).await.unwrap();

        let err = h.service.refresh(&login.refresh_token, &ctx()).await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshTokenNotFound));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let h = harness();
        h.service
            .register(registration("user@example.com", "password123"), &ctx())
            .await
            .unwrap();

        let wrong_password = h
            .service
            .login(SubjectKind::Customer, "user@example.com", "password124", &ctx())
            .await
            .unwrap_err();
        let unknown_email = h
            .service
            .login(SubjectKind::Customer, "nobody@example.com", "password123", &ctx())
            .await
            .unwrap_err();
        let malformed_email = h
            .service
            .login(SubjectKind::Customer, "not-an-email", "password123", &ctx())
            .await
            .unwrap_err();

        for err in [&wrong_password, &unknown_email, &malformed_email] {
            assert!(matches!(err, AuthError::InvalidCredentials));
            assert_eq!(err.to_string(), "invalid credentials");
        }
    }

    #[tokio::test]
    async fn test_login_kind_is_scoped() {
        let h = harness();
        let hash = h.hasher.hash("adminpass1").await.unwrap();
        let admin = Admin::new(Uuid::new_v4(), "boss@butchery.com", hash, "Boss").unwrap();
        AdminStore::save(h.store.as_ref(), &admin).await.unwrap();

        let login = h
            .service
            .login(SubjectKind::Admin, "BOSS@butchery.com", "adminpass1", &ctx())
            .await
            .unwrap();
        let subject = h
            .service
            .token_service()
            .validate_access_token(&login.access_token)
            .unwrap();
        assert_eq!(subject, SubjectRef::admin(admin.id));

        // Admins cannot log in through the customer flow
        let err = h
            .service
            .login(SubjectKind::Customer, "boss@butchery.com", "adminpass1", &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_registration_email_is_case_insensitive() {
        let h = harness();
        h.service
            .register(registration("User@EXAMPLE.com", "password123"), &ctx())
            .await
            .unwrap();

        let err = h
            .service
            .register(registration("user@example.com", "password123"), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailAlreadyExists));
    }

    #[tokio::test]
    async fn test_password_length_boundary() {
        let h = harness();

        assert!(h
            .service
            .register(registration("eight@example.com", "12345678"), &ctx())
            .await
            .is_ok());

        let err = h
            .service
            .register(registration("seven@example.com", "1234567"), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::Validation(ValidationError::PasswordTooShort)
        ));
    }

    #[tokio::test]
    async fn test_registration_validation_order() {
        let h = harness();
        h.service
            .register(registration("taken@example.com", "password123"), &ctx())
            .await
            .unwrap();

        let everything_wrong = Registration {
            email: "bad".to_string(),
            password: "short".to_string(),
            full_name: " ".to_string(),
            phone: " ".to_string(),
        };
        assert!(matches!(
            h.service.register(everything_wrong, &ctx()).await,
            Err(AuthError::Validation(ValidationError::InvalidEmail))
        ));

        let bad_password_and_phone = Registration {
            email: "ok@example.com".to_string(),
            password: "short".to_string(),
            full_name: "Name".to_string(),
            phone: "".to_string(),
        };
        assert!(matches!(
            h.service.register(bad_password_and_phone, &ctx()).await,
            Err(AuthError::Validation(ValidationError::PasswordTooShort))
        ));

        let bad_phone = Registration {
            email: "taken@example.com".to_string(),
            password: "password123".to_string(),
            full_name: "Name".to_string(),
            phone: "   ".to_string(),
        };
        assert!(matches!(
            h.service.register(bad_phone, &ctx()).await,
            Err(AuthError::Validation(ValidationError::InvalidPhoneNumber))
        ));

        // Uniqueness is checked before the name
        let taken_and_nameless = Registration {
            email: "taken@example.com".to_string(),
            password: "password123".to_string(),
            full_name: "".to_string(),
            phone: "+1".to_string(),
        };
        assert!(matches!(
            h.service.register(taken_and_nameless, &ctx()).await,
            Err(AuthError::EmailAlreadyExists)
        ));

        let nameless = Registration {
            email: "fresh@example.com".to_string(),
            password: "password123".to_string(),
            full_name: "".to_string(),
            phone: "+1".to_string(),
        };
        assert!(matches!(
            h.service.register(nameless, &ctx()).await,
            Err(AuthError::Validation(ValidationError::EmptyName))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_registrations_have_one_winner() {
        let h = harness();
        let mut handles = Vec::new();
        for _ in 0..6 {
            let service = h.service.clone();
            handles.push(tokio::spawn(async move {
                service
                    .register(registration("race@example.com", "password123"), &ctx())
                    .await
            }));
        }

        let mut winners = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(AuthError::EmailAlreadyExists) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_refresh_expiry_boundary() {
        let h = harness();
        h.service
            .register(registration("exp@example.com", "password123"), &ctx())
            .await
            .unwrap();
        let login = h
            .service
            .login(SubjectKind::Customer, "exp@example.com", "password123", &ctx())
            .await
            .unwrap();

        let issued_at = h.clock.now();
        h.clock.set(issued_at + RefreshToken::ttl() - chrono::Duration::seconds(1));
        assert!(h.service.refresh(&login.refresh_token, &ctx()).await.is_ok());

        h.clock.set(issued_at + RefreshToken::ttl());
        assert!(matches!(
            h.service.refresh(&login.refresh_token, &ctx()).await,
            Err(AuthError::RefreshTokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_refresh_does_not_rotate() {
        let h = harness();
        h.service
            .register(registration("again@example.com", "password123"), &ctx())
            .await
            .unwrap();
        let login = h
            .service
            .login(SubjectKind::Customer, "again@example.com", "password123", &ctx())
            .await
            .unwrap();

        for _ in 0..3 {
            assert!(h.service.refresh(&login.refresh_token, &ctx()).await.is_ok());
        }
        assert_eq!(h.store.refresh_token_count().await, 1);
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let h = harness();
        h.service.logout("never-issued", None, &ctx()).await.unwrap();

        h.service
            .register(registration("out@example.com", "password123"), &ctx())
            .await
            .unwrap();
        let login = h
            .service
            .login(SubjectKind::Customer, "out@example.com", "password123", &ctx())
            .await
            .unwrap();

        h.service.logout(&login.refresh_token, None, &ctx()).await.unwrap();
        h.service.logout(&login.refresh_token, None, &ctx()).await.unwrap();
        assert_eq!(h.store.refresh_token_count().await, 0);
    }

    #[tokio::test]
    async fn test_multiple_sessions_and_bulk_revocation() {
        let h = harness();
        let registered = h
            .service
            .register(registration("multi@example.com", "password123"), &ctx())
            .await
            .unwrap();

        let first = h
            .service
            .login(SubjectKind::Customer, "multi@example.com", "password123", &ctx())
            .await
            .unwrap();
        let second = h
            .service
            .login(SubjectKind::Customer, "multi@example.com", "password123", &ctx())
            .await
            .unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(h.store.refresh_token_count().await, 2);

        assert_eq!(h.service.revoke_all_sessions(registered.id).await.unwrap(), 2);
        assert!(matches!(
            h.service.refresh(&first.refresh_token, &ctx()).await,
            Err(AuthError::RefreshTokenNotFound)
        ));
    }

    /// Refresh token store whose writes always fail
    struct FailingTokenStore;

    #[async_trait]
    impl RefreshTokenStore for FailingTokenStore {
        async fn save(&self, _token: &RefreshToken) -> Result<(), StoreError> {
            Err(StoreError::Database("connection reset".to_string()))
        }

        async fn find_by_hash(&self, _token_hash: &str) -> Result<RefreshToken, StoreError> {
            Err(StoreError::Database("connection reset".to_string()))
        }

        async fn delete_by_hash(&self, _token_hash: &str) -> Result<(), StoreError> {
            Err(StoreError::Database("connection reset".to_string()))
        }

        async fn delete_by_subject(&self, _subject_id: Uuid) -> Result<u64, StoreError> {
            Err(StoreError::Database("connection reset".to_string()))
        }

        async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<u64, StoreError> {
            Err(StoreError::Database("connection reset".to_string()))
        }
    }

    #[tokio::test]
    async fn test_login_aborts_when_session_cannot_be_stored() {
        let store = Arc::new(MemoryStore::new());
        let h = harness_with(store.clone(), store, Arc::new(FailingTokenStore));
        h.service
            .register(registration("fail@example.com", "password123"), &ctx())
            .await
            .unwrap();

        let err = h
            .service
            .login(SubjectKind::Customer, "fail@example.com", "password123", &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));

        assert!(matches!(
            h.service.logout("anything", None, &ctx()).await,
            Err(AuthError::Internal(_))
        ));
        assert!(matches!(
            h.service.refresh("anything", &ctx()).await,
            Err(AuthError::Internal(_))
        ));
    }

    /// Customer store that never answers
    struct StalledCustomerStore;

    #[async_trait]
    impl CustomerStore for StalledCustomerStore {
        async fn find_by_email(&self, _email: &Email) -> Result<Customer, StoreError> {
            std::future::pending().await
        }

        async fn find_by_id(&self, _id: Uuid) -> Result<Customer, StoreError> {
            std::future::pending().await
        }

        async fn exists_by_email(&self, _email: &Email) -> Result<bool, StoreError> {
            std::future::pending().await
        }

        async fn save(&self, _customer: &Customer) -> Result<(), StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_slow_store_times_out() {
        let store = Arc::new(MemoryStore::new());
        let h = harness_with(store.clone(), Arc::new(StalledCustomerStore), store);
        let service = h.service.with_operation_timeout(Duration::from_millis(50));

        let err = service
            .login(SubjectKind::Customer, "slow@example.com", "password123", &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(ref m) if m.contains("timed out")));
    }
}
