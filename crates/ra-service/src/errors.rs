//! Error types for the authentication flow and the HTTP surface.
//!
//! `AuthError` distinguishes every failure cause inside the flow so it can be
//! logged and counted. Callers outside the flow only ever see
//! [`Unauthenticated`]; the HTTP layer turns that into a 401 with a generic
//! body. Internal reasons never reach clients.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Failure causes inside the authentication flow.
///
/// Reasons carried by the variants are for server-side logs only and must
/// never contain the raw token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The identity provider's key set could not be fetched and no usable
    /// cached copy exists.
    #[error("Signing key set unavailable: {0}")]
    KeySetUnavailable(String),

    /// Malformed, expired, or mismatched credential.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// A verified token lacked a claim the user store needs.
    #[error("Incomplete claims: missing {0}")]
    IncompleteClaims(&'static str),

    /// The user store could not be reached or a query failed.
    #[error("User store unavailable: {0}")]
    StoreUnavailable(String),

    /// The claimed email already belongs to a different subject.
    #[error("User conflict: email is linked to another subject")]
    UserConflict,
}

impl AuthError {
    /// Bounded label used for logs and metrics.
    pub fn cause(&self) -> &'static str {
        match self {
            AuthError::KeySetUnavailable(_) => "key_set_unavailable",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::IncompleteClaims(_) => "incomplete_claims",
            AuthError::StoreUnavailable(_) => "store_unavailable",
            AuthError::UserConflict => "user_conflict",
        }
    }
}

/// The single externally visible authentication failure.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("Unauthenticated")]
pub struct Unauthenticated;

/// HTTP-facing error type.
///
/// Maps to:
/// - Unauthenticated: 401 Unauthorized (with `WWW-Authenticate`)
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<Unauthenticated> for ApiError {
    fn from(_: Unauthenticated) -> Self {
        ApiError::Unauthenticated
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "Invalid or expired token",
            ),
            ApiError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "ra.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable",
                )
            }
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message: message.to_string(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"research-analyst-api\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
