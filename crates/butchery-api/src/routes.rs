//! API route definitions

use crate::auth::middleware::{auth_middleware, require_admin, require_customer};
use crate::handlers::auth;
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::customer_login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/admin/auth/login", post(auth::admin_login_handler));

    let admin_routes = Router::new()
        .route("/admin/whoami", get(auth::admin_whoami_handler))
        .route_layer(middleware::from_fn(require_admin));

    let customer_routes = Router::new()
        .route("/customer/whoami", get(auth::customer_whoami_handler))
        .route_layer(middleware::from_fn(require_customer));

    // Protected routes; the kind guards above run after token validation
    let protected_routes = Router::new()
        .route("/auth/logout", post(auth::logout_handler))
        .route("/auth/me", get(auth::me_handler))
        .merge(admin_routes)
        .merge(customer_routes)
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
