//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET   /health                     - Liveness
//! GET   /health/ready               - Readiness (database ping)
//!
//! # Auth (rate limited)
//! POST  /api/auth/register          - Create an account
//! POST  /api/auth/login             - Email + password login
//! POST  /api/auth/refresh           - Rotate refresh token, new access token
//! POST  /api/auth/logout            - Revoke a refresh token (requires auth)
//! GET   /api/auth/me                - Current account (requires auth)
//! POST  /api/auth/change-password   - Change password, sign out everywhere (requires auth)
//!
//! # Orders
//! GET   /api/orders/statuses        - Status catalogue
//! PATCH /api/orders/{id}/status     - Change order status (requires auth)
//! ```

pub mod auth;
pub mod health;
pub mod orders;

use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    auth_rate_limiter, authenticate, request_id_middleware, security_headers_middleware,
};
use crate::config::ApiConfig;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes(config: &ApiConfig) -> Router<AppState> {
    let router = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .route("/change-password", post(auth::change_password));

    if config.auth_rate_limit {
        router.layer(auth_rate_limiter(config.trust_proxy_headers))
    } else {
        router
    }
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/statuses", get(orders::statuses))
        .route("/{id}/status", patch(orders::change_status))
}

/// Create all routes for the API.
pub fn routes(config: &ApiConfig) -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api/auth", auth_routes(config))
        .nest("/api/orders", order_routes())
}

/// The complete application: routes plus the middleware stack, minus the
/// Sentry layers which the binary adds on top.
pub fn app(state: AppState) -> Router {
    routes(state.config())
        .layer(middleware::from_fn_with_state(state.clone(), authenticate))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
