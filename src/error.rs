//! API error taxonomy and its HTTP mapping.
//!
//! Every failure leaves the service as `{"error": "<message>"}`. Internal detail is
//! logged, never returned.

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{credentials::CredentialError, policy::Denial, repository::StoreError, token::TokenError};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Wrong username/password, or wrong old password on change (401).
    #[error("credential invalid: {message}")]
    CredentialInvalid { message: String },

    /// Missing, malformed, expired or forged bearer token (401).
    #[error("token invalid: {reason}")]
    TokenInvalid { reason: String },

    /// Authenticated but not allowed (403). `detail` is for logs only.
    #[error("policy denied: {detail}")]
    PolicyDenied { detail: String },

    /// A workflow step failed and the whole unit was rolled back (500).
    #[error("transaction failed: {detail}")]
    TransactionFailed { detail: String },

    /// Malformed or incomplete input (400).
    #[error("validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("conflict: {message}")]
    Conflict { message: String },

    /// Anything unexpected (500). `message` is for logs only.
    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Wire shape of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

impl ApiError {
    pub fn credential_invalid(message: impl Into<String>) -> Self {
        Self::CredentialInvalid {
            message: message.into(),
        }
    }

    /// The one response for both "unknown user" and "bad password".
    pub fn bad_sign_in() -> Self {
        Self::credential_invalid("invalid username or password")
    }

    pub fn token_invalid(reason: impl Into<String>) -> Self {
        Self::TokenInvalid {
            reason: reason.into(),
        }
    }

    pub fn policy_denied(detail: impl Into<String>) -> Self {
        Self::PolicyDenied {
            detail: detail.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::CredentialInvalid { .. } | ApiError::TokenInvalid { .. } => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::PolicyDenied { .. } => StatusCode::FORBIDDEN,
            ApiError::ValidationFailed { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::TransactionFailed { .. } | ApiError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// The message placed in the response body.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::CredentialInvalid { message } => message.clone(),
            ApiError::TokenInvalid { reason } => format!("unauthorized: {}", reason),
            ApiError::PolicyDenied { .. } => "forbidden".to_string(),
            ApiError::TransactionFailed { .. } => {
                "transaction failed; no changes were applied".to_string()
            }
            ApiError::ValidationFailed { message } => message.clone(),
            ApiError::NotFound { resource } => format!("{} not found", resource),
            ApiError::Conflict { message } => message.clone(),
            ApiError::Internal { .. } => "internal server error".to_string(),
        }
    }

    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_server_error() {
            tracing::error!(error = %self, status = %status, "Server error occurred");
        } else {
            tracing::debug!(error = %self, status = %status, "Client error occurred");
        }

        let body = ErrorBody {
            error: self.user_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(message) => ApiError::internal(message),
            other => ApiError::token_invalid(other.to_string()),
        }
    }
}

impl From<Denial> for ApiError {
    fn from(e: Denial) -> Self {
        ApiError::policy_denied(e.to_string())
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        ApiError::internal(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(resource) => ApiError::not_found(resource),
            StoreError::Conflict(message) => ApiError::conflict(message),
            StoreError::Constraint(detail) | StoreError::Transaction(detail) => {
                ApiError::TransactionFailed { detail }
            }
            StoreError::Decode(message) => ApiError::internal(message),
            StoreError::Database(e) => ApiError::internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::validation(e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        ApiError::validation(e.body_text())
    }
}
