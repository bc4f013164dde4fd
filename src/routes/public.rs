use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// The only endpoints that skip both gates.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers and orchestration.
        .route("/health", get(|| async { "ok" }))
        // POST /login
        // Exchanges a username/password for a role-specific profile and bearer token.
        .route("/login", post(handlers::login))
}
