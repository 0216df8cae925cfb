//! Authentication and authorization module
//!
//! - Access token issuing and validation (HMAC-signed JWT)
//! - Opaque refresh secrets and their lookup hashes
//! - Password hashing with Argon2id
//! - The auth orchestrator (login, registration, refresh, logout)
//! - Bearer token middleware and subject kind guards

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod service;

pub use jwt::{hash_refresh_secret, issue_refresh_secret, Claims, JwtConfig, TokenError, TokenService};
pub use middleware::{
    auth_middleware, require_admin, require_customer, AuthRejection, AuthenticatedSubject,
};
pub use password::{Argon2Hasher, PasswordConfig, PasswordError, PasswordHasher};
pub use service::{
    AuthError, AuthService, LoginResult, RefreshResult, RegisterResult, Registration,
};
