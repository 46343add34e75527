//! Authentication middleware for protected routes.
//!
//! `require_user` runs the request authenticator on the `Authorization`
//! header and injects the resolved [`UserRecord`](crate::models::UserRecord) into request extensions.

use crate::auth::RequestAuthenticator;
use crate::errors::ApiError;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub authenticator: Arc<RequestAuthenticator>,
}

/// Authentication middleware for user requests.
///
/// # Response
///
/// - Returns 401 Unauthorized if the header is missing or authentication fails
/// - Continues to next handler with `UserRecord` in extensions otherwise
#[instrument(skip_all, name = "ra.middleware.require_user")]
pub async fn require_user(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    // A missing or non-ASCII header is authenticated as empty so it is
    // counted like any other malformed header.
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let user = state.authenticator.authenticate(header).await?;

    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}
