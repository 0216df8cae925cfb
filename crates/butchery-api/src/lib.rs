//! Butchery API - authentication server for administrators and customers
//!
//! Provides HTTP endpoints for customer registration, admin and customer
//! login, access token refresh and logout.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use crate::handlers::{auth as auth_handlers, health};
use crate::middleware::security_headers_middleware;
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Butchery Auth API",
        description = "Administrator and customer authentication"
    ),
    paths(
        health::health_check,
        health::readiness_check,
        auth_handlers::register_handler,
        auth_handlers::customer_login_handler,
        auth_handlers::admin_login_handler,
        auth_handlers::refresh_handler,
        auth_handlers::logout_handler,
        auth_handlers::me_handler,
        auth_handlers::admin_whoami_handler,
        auth_handlers::customer_whoami_handler,
    ),
    components(schemas(
        error::ApiError,
        health::HealthResponse,
        health::ReadinessResponse,
        health::ReadinessChecks,
        auth_handlers::RegisterRequest,
        auth_handlers::LoginRequest,
        auth_handlers::RefreshTokenRequest,
        auth_handlers::RegisterResponse,
        auth_handlers::LoginResponse,
        auth_handlers::RefreshResponse,
        auth::AuthenticatedSubject,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "auth", description = "Registration, login, refresh and logout"),
        (name = "admin", description = "Administrator-only endpoints"),
        (name = "customer", description = "Customer-only endpoints")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let request_timeout = Duration::from_secs(state.config.server.request_timeout_secs);
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .nest("/api/v1", routes::api_routes(state.clone()))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300))
}

/// Router over an in-memory store with cheap password hashing
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing() -> Router {
    create_router(Arc::new(test_state()))
}

/// State behind [`create_router_for_testing`], exposed so tests can seed
/// administrators and inspect the clock
#[cfg(any(test, feature = "test-utils"))]
pub fn test_state_with(
    store: Arc<butchery_core::MemoryStore>,
    clock: Arc<dyn butchery_core::Clock>,
) -> AppState {
    let mut config = butchery_core::AppConfig::default();
    config.auth.jwt_secret = "integration-test-secret".to_string();

    AppState::from_parts(config, store, clock, auth::PasswordConfig::insecure_fast())
}

#[cfg(any(test, feature = "test-utils"))]
fn test_state() -> AppState {
    test_state_with(
        Arc::new(butchery_core::MemoryStore::new()),
        Arc::new(butchery_core::SystemClock),
    )
}
