/// Router Module Index
///
/// Routes are split by whether they sit behind the gates. Everything in
/// `authenticated` is wrapped by the Authentication and Authorization Gates at
/// assembly time in `create_router`.

/// Routes reachable without a token: liveness and sign-in.
pub mod public;

/// Routes behind both gates, declared together with their method so the policy
/// table can be checked against them.
pub mod authenticated;

use axum::http::Method;

use crate::policy::PolicyTable;

/// Protected routes the policy table has no entry for. The binary refuses to start
/// unless this is empty.
pub fn uncovered_routes(policy: &PolicyTable) -> Vec<(Method, String)> {
    let endpoints = authenticated::protected_endpoints();
    policy.missing_entries(endpoints.iter().map(|e| (&e.method, e.path)))
}
