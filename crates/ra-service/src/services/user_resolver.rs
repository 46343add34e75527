//! User resolution: from verified claims to a row in `users`.
//!
//! The first successful verification for a subject creates the user on the
//! `trial` tier. Later verifications return the same row, overwriting the
//! email in place when the provider reports a new one.
//!
//! # Concurrency
//!
//! Each call runs in one transaction that locks the subject's row with
//! `SELECT ... FOR UPDATE`. Two first-time requests for the same subject can
//! both miss the lookup; the loser's INSERT hits the subject unique
//! constraint, rolls back, and re-runs the lookup once.

use crate::auth::claims::TokenClaims;
use crate::errors::AuthError;
use crate::models::{PlanTier, UserRecord};
use crate::observability::metrics;
use crate::repositories::{unique_violation, UniqueViolation, UsersRepository};
use sqlx::PgPool;
use tracing::instrument;

/// What a resolve call did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Created,
    Updated,
    Unchanged,
}

impl SyncAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncAction::Created => "created",
            SyncAction::Updated => "updated",
            SyncAction::Unchanged => "unchanged",
        }
    }
}

/// Maps verified claims to a user record (enables mocking).
#[async_trait::async_trait]
pub trait UserResolver: Send + Sync {
    /// Find or create the user for `claims`.
    ///
    /// # Errors
    ///
    /// - `AuthError::IncompleteClaims` - subject or email missing or empty
    /// - `AuthError::UserConflict` - the email belongs to another subject
    /// - `AuthError::StoreUnavailable` - connection or query failure
    async fn resolve(&self, claims: &TokenClaims) -> Result<UserRecord, AuthError>;
}

/// Postgres-backed resolver.
#[derive(Clone)]
pub struct PgUserResolver {
    pool: PgPool,
}

impl PgUserResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find or create the user, reporting what changed.
    #[instrument(skip_all)]
    pub async fn sync(&self, claims: &TokenClaims) -> Result<(UserRecord, SyncAction), AuthError> {
        let (subject, email) = claims.identity()?;

        let result = match self.sync_once(subject, email).await {
            Err(e) if unique_violation(&e) == Some(UniqueViolation::Subject) => {
                tracing::debug!(
                    target: "ra.services.user_resolver",
                    "Concurrent create for subject, re-reading"
                );
                self.sync_once(subject, email).await
            }
            other => other,
        };

        match result {
            Ok((user, action)) => {
                metrics::record_user_sync(action.as_str());
                match action {
                    SyncAction::Created => tracing::info!(
                        target: "ra.services.user_resolver",
                        user_id = %user.id,
                        plan_tier = %user.plan_tier,
                        "Created user on first sign-in"
                    ),
                    SyncAction::Updated => tracing::info!(
                        target: "ra.services.user_resolver",
                        user_id = %user.id,
                        "Updated user email from identity provider"
                    ),
                    SyncAction::Unchanged => tracing::debug!(
                        target: "ra.services.user_resolver",
                        user_id = %user.id,
                        "User already in sync"
                    ),
                }
                Ok((user, action))
            }
            Err(e) => {
                let error = map_store_error(&e);
                metrics::record_user_sync(error.cause());
                Err(error)
            }
        }
    }

    async fn sync_once(
        &self,
        subject: &str,
        email: &str,
    ) -> Result<(UserRecord, SyncAction), sqlx::Error> {
        // Dropping the transaction on an early return rolls it back.
        let mut tx = self.pool.begin().await?;

        let synced = match UsersRepository::find_by_subject_for_update(&mut *tx, subject).await? {
            Some(user) if user.email == email => (user, SyncAction::Unchanged),
            Some(user) => (
                UsersRepository::update_email(&mut *tx, user.id, email).await?,
                SyncAction::Updated,
            ),
            None => (
                UsersRepository::insert(&mut *tx, subject, email, PlanTier::default()).await?,
                SyncAction::Created,
            ),
        };

        tx.commit().await?;
        Ok(synced)
    }
}

fn map_store_error(err: &sqlx::Error) -> AuthError {
    match unique_violation(err) {
        Some(UniqueViolation::Email) => {
            tracing::warn!(
                target: "ra.services.user_resolver",
                "Email already linked to a different subject"
            );
            AuthError::UserConflict
        }
        _ => {
            tracing::error!(target: "ra.services.user_resolver", error = %err, "User store operation failed");
            AuthError::StoreUnavailable(err.to_string())
        }
    }
}

#[async_trait::async_trait]
impl UserResolver for PgUserResolver {
    async fn resolve(&self, claims: &TokenClaims) -> Result<UserRecord, AuthError> {
        self.sync(claims).await.map(|(user, _)| user)
    }
}

/// Mock user resolver module for testing.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock resolver that returns a fixed outcome and counts calls.
    pub struct MockUserResolver {
        outcome: Result<UserRecord, AuthError>,
        call_count: AtomicUsize,
    }

    impl MockUserResolver {
        /// Create a mock that always returns `user`.
        pub fn returning(user: UserRecord) -> Self {
            Self {
                outcome: Ok(user),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Create a mock that always fails with `error`.
        pub fn failing(error: AuthError) -> Self {
            Self {
                outcome: Err(error),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Get the number of calls made.
        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl UserResolver for MockUserResolver {
        async fn resolve(&self, claims: &TokenClaims) -> Result<UserRecord, AuthError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            claims.identity()?;
            self.outcome.clone()
        }
    }
}
