use crate::{AppState, handlers};
use axum::{
    Router,
    http::Method,
    routing::{MethodRouter, get, post, put},
};

/// ProtectedEndpoint
///
/// One method on one route pattern. The pattern is exactly what axum reports as the
/// `MatchedPath`, which is also the policy table's key.
pub struct ProtectedEndpoint {
    pub method: Method,
    pub path: &'static str,
    pub handler: MethodRouter<AppState>,
}

impl ProtectedEndpoint {
    fn new(method: Method, path: &'static str, handler: MethodRouter<AppState>) -> Self {
        Self {
            method,
            path,
            handler,
        }
    }
}

/// Every endpoint that requires a token.
pub fn protected_endpoints() -> Vec<ProtectedEndpoint> {
    vec![
        // --- Account ---
        ProtectedEndpoint::new(Method::GET, "/me", get(handlers::get_me)),
        ProtectedEndpoint::new(Method::PUT, "/me/password", put(handlers::change_password)),
        ProtectedEndpoint::new(
            Method::POST,
            "/admin/password-reset",
            post(handlers::reset_password),
        ),
        ProtectedEndpoint::new(Method::POST, "/admin/accounts", post(handlers::create_account)),
        // --- Graduation ---
        ProtectedEndpoint::new(Method::POST, "/graduations", post(handlers::create_graduation)),
        ProtectedEndpoint::new(Method::GET, "/graduations", get(handlers::list_graduations)),
        ProtectedEndpoint::new(Method::GET, "/graduations/{id}", get(handlers::get_graduation)),
        ProtectedEndpoint::new(
            Method::PUT,
            "/graduations/{id}",
            put(handlers::update_graduation),
        ),
        // --- Registration ---
        ProtectedEndpoint::new(Method::POST, "/registrations", post(handlers::register)),
        ProtectedEndpoint::new(
            Method::GET,
            "/students/{id}/enrollments",
            get(handlers::list_enrollments),
        ),
        // --- Reports ---
        ProtectedEndpoint::new(Method::POST, "/reports", post(handlers::create_report)),
        ProtectedEndpoint::new(Method::GET, "/reports", get(handlers::list_reports)),
    ]
}

/// Authenticated Router Module
///
/// Builds the router from `protected_endpoints`. Method routers registered on the
/// same path are merged by axum.
pub fn authenticated_routes() -> Router<AppState> {
    protected_endpoints()
        .into_iter()
        .fold(Router::new(), |router, endpoint| {
            router.route(endpoint.path, endpoint.handler)
        })
}
