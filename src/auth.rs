use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::{HeaderMap, header, request::Parts},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use thiserror::Error;

use crate::{
    error::{ApiError, ApiResult},
    models::Role,
    policy::PolicyTable,
    token::{Claims, TokenService},
};

/// AuthUser
///
/// The identity resolved by the Authentication Gate. Built from verified token
/// claims only; no lookup happens on the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub username: String,
    pub role: Role,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            username: claims.sub,
            role: claims.role,
        }
    }
}

impl AuthUser {
    /// Students may only touch records keyed by their own id. Teachers and admins
    /// pass unconditionally.
    pub fn require_owner_or_staff(&self, student_id: &str) -> ApiResult<()> {
        match self.role {
            Role::Student if self.username != student_id => {
                tracing::warn!(
                    username = %self.username,
                    requested = student_id,
                    "Student attempted to access another student's record"
                );
                Err(ApiError::policy_denied(format!(
                    "student '{}' does not own '{}'",
                    self.username, student_id
                )))
            }
            Role::Student | Role::Teacher | Role::Admin => Ok(()),
        }
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("missing credential: {0}")]
pub struct MissingCredential(pub &'static str);

impl From<MissingCredential> for ApiError {
    fn from(e: MissingCredential) -> Self {
        ApiError::token_invalid(e.0)
    }
}

/// extract_bearer
///
/// Accepts exactly one `Authorization` header of the form `Bearer <token>` where the
/// token is non-empty and contains no whitespace.
pub fn extract_bearer(headers: &HeaderMap) -> Result<&str, MissingCredential> {
    let mut values = headers.get_all(header::AUTHORIZATION).iter();

    let value = values
        .next()
        .ok_or(MissingCredential("no authorization header"))?;
    if values.next().is_some() {
        return Err(MissingCredential("multiple authorization headers"));
    }

    let value = value
        .to_str()
        .map_err(|_| MissingCredential("authorization header is not valid text"))?;
    let token = value
        .strip_prefix("Bearer ")
        .ok_or(MissingCredential("authorization scheme must be Bearer"))?;

    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(MissingCredential("malformed bearer token"));
    }
    Ok(token)
}

/// authenticate
///
/// Authentication Gate. Rejects with 401 before any handler runs unless the request
/// carries a valid, unexpired token; on success attaches the `AuthUser`.
pub async fn authenticate(
    State(tokens): State<Arc<TokenService>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let claims = {
        let token = extract_bearer(request.headers()).inspect_err(|e| {
            tracing::debug!(reason = e.0, "Request without usable bearer token");
        })?;
        tokens.validate(token).map_err(|e| {
            tracing::warn!(reason = %e, "Rejected bearer token");
            ApiError::from(e)
        })?
    };

    request.extensions_mut().insert(AuthUser::from(claims));
    Ok(next.run(request).await)
}

/// authorize
///
/// Authorization Gate. Must run after `authenticate`. Looks the matched route
/// pattern up in the policy table; anything without an entry is denied.
pub async fn authorize(
    State(policy): State<Arc<PolicyTable>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::token_invalid("no authenticated identity"))?;

    let Some(route) = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
    else {
        tracing::warn!(username = %user.username, "No matched route; denying");
        return Err(ApiError::policy_denied("request has no matched route"));
    };

    if let Err(denial) = policy.authorize(user.role, request.method(), &route) {
        tracing::warn!(
            username = %user.username,
            role = %user.role,
            denial = %denial,
            "Authorization denied"
        );
        return Err(denial.into());
    }

    Ok(next.run(request).await)
}

/// Handlers behind the gates take `AuthUser` as an argument. Outside the gates the
/// extension is absent and extraction rejects with 401.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::token_invalid("no authenticated identity"))
    }
}
