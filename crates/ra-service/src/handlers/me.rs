//! Current user handler.

use crate::models::{MeResponse, UserRecord};
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/v1/me
///
/// Returns the authenticated user's record as synced from the identity
/// provider. Requires the `require_user` middleware.
///
/// ```json
/// {
///   "user_id": "5f0c...",
///   "email": "a@x.com",
///   "plan_tier": "trial",
///   "message": "Hello a@x.com!"
/// }
/// ```
#[instrument(skip_all, name = "ra.handlers.me")]
pub async fn get_me(Extension(user): Extension<UserRecord>) -> Json<MeResponse> {
    tracing::debug!(target: "ra.handlers.me", user_id = %user.id, "Returning current user");
    Json(MeResponse::from(user))
}
