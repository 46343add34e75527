//! Users repository for database operations.
//!
//! Every function takes any Postgres executor so callers can run it on the
//! pool or inside a transaction.
//!
//! # Security
//!
//! - All queries use parameterized statements
//! - Subject and email values are never logged

use crate::models::{PlanTier, UserRecord};
use crate::observability::metrics;
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Row};
use std::time::Instant;
use tracing::instrument;

/// Unique constraint on `users.external_subject_id`.
pub const SUBJECT_UNIQUE_CONSTRAINT: &str = "users_external_subject_id_key";

/// Unique constraint on `users.email`.
pub const EMAIL_UNIQUE_CONSTRAINT: &str = "users_email_key";

const USER_COLUMNS: &str = "id, email, external_subject_id, plan_tier, created_at, updated_at";

/// Which unique constraint a failed write hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueViolation {
    Subject,
    Email,
    Other,
}

/// Classify `err` if it is a unique violation (SQLSTATE 23505).
pub fn unique_violation(err: &sqlx::Error) -> Option<UniqueViolation> {
    let db_err = err.as_database_error()?;
    if !db_err.is_unique_violation() {
        return None;
    }

    Some(match db_err.constraint() {
        Some(SUBJECT_UNIQUE_CONSTRAINT) => UniqueViolation::Subject,
        Some(EMAIL_UNIQUE_CONSTRAINT) => UniqueViolation::Email,
        _ => UniqueViolation::Other,
    })
}

/// Users repository for database operations.
pub struct UsersRepository;

impl UsersRepository {
    /// Look up a user by exact, case-sensitive subject identifier.
    #[instrument(skip_all, name = "ra.repo.find_user_by_subject")]
    pub async fn find_by_subject<'e, E>(
        executor: E,
        external_subject_id: &str,
    ) -> Result<Option<UserRecord>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let start = Instant::now();

        let result = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_subject_id = $1"
        ))
        .bind(external_subject_id)
        .fetch_optional(executor)
        .await;

        record("find_user_by_subject", &result, start);
        result?.map(map_row_to_user).transpose()
    }

    /// Same as [`Self::find_by_subject`] but takes a row lock until the
    /// surrounding transaction ends.
    #[instrument(skip_all, name = "ra.repo.find_user_by_subject_for_update")]
    pub async fn find_by_subject_for_update<'e, E>(
        executor: E,
        external_subject_id: &str,
    ) -> Result<Option<UserRecord>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let start = Instant::now();

        let result = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE external_subject_id = $1 FOR UPDATE"
        ))
        .bind(external_subject_id)
        .fetch_optional(executor)
        .await;

        record("find_user_by_subject_for_update", &result, start);
        result?.map(map_row_to_user).transpose()
    }

    /// Overwrite a user's email and bump `updated_at`.
    #[instrument(skip_all, name = "ra.repo.update_user_email")]
    pub async fn update_email<'e, E>(
        executor: E,
        id: uuid::Uuid,
        email: &str,
    ) -> Result<UserRecord, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let start = Instant::now();

        let result = sqlx::query(&format!(
            "UPDATE users SET email = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(email)
        .fetch_one(executor)
        .await;

        record("update_user_email", &result, start);
        map_row_to_user(result?)
    }

    /// Insert a new user. The database assigns `id`, `created_at` and
    /// `updated_at`.
    #[instrument(skip_all, name = "ra.repo.insert_user")]
    pub async fn insert<'e, E>(
        executor: E,
        external_subject_id: &str,
        email: &str,
        plan_tier: PlanTier,
    ) -> Result<UserRecord, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let start = Instant::now();

        let result = sqlx::query(&format!(
            r#"
            INSERT INTO users (email, external_subject_id, plan_tier)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(external_subject_id)
        .bind(plan_tier.as_str())
        .fetch_one(executor)
        .await;

        record("insert_user", &result, start);
        map_row_to_user(result?)
    }
}

fn record<T>(operation: &str, result: &Result<T, sqlx::Error>, start: Instant) {
    let status = if result.is_ok() { "success" } else { "error" };
    metrics::record_db_query(operation, status, start.elapsed());
}

fn map_row_to_user(row: PgRow) -> Result<UserRecord, sqlx::Error> {
    let plan_tier: String = row.try_get("plan_tier")?;
    let plan_tier = plan_tier
        .parse::<PlanTier>()
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

    Ok(UserRecord {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        external_subject_id: row.try_get("external_subject_id")?,
        plan_tier,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
