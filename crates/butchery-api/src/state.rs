//! Application state management

use crate::auth::{Argon2Hasher, AuthService, JwtConfig, PasswordConfig, TokenService};
use butchery_core::{
    AdminStore, AppConfig, Clock, CustomerStore, MemoryStore, RefreshTokenStore, SystemClock,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Auth orchestrator
    pub auth: AuthService,
    /// Access token validation for the bearer middleware
    pub tokens: Arc<TokenService>,
    /// Store probed by the readiness check
    pub readiness: Arc<dyn RefreshTokenStore>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Build state over a single store backing all three collections
    pub fn new<S>(config: AppConfig, store: Arc<S>) -> Self
    where
        S: AdminStore + CustomerStore + RefreshTokenStore + 'static,
    {
        Self::from_parts(
            config,
            store,
            Arc::new(SystemClock),
            PasswordConfig::default(),
        )
    }

    /// In-memory state for development and tests
    pub fn in_memory(config: AppConfig) -> Self {
        Self::new(config, Arc::new(MemoryStore::new()))
    }

    pub fn from_parts<S>(
        config: AppConfig,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        password: PasswordConfig,
    ) -> Self
    where
        S: AdminStore + CustomerStore + RefreshTokenStore + 'static,
    {
        let tokens = Arc::new(TokenService::new(
            JwtConfig::from(&config.auth),
            clock.clone(),
        ));

        let auth = AuthService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(Argon2Hasher::new(password)),
            tokens.clone(),
            clock,
        )
        .with_operation_timeout(Duration::from_secs(config.auth.operation_timeout_secs));

        Self {
            config,
            auth,
            tokens,
            readiness: store,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
