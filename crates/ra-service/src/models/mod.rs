//! Research Analyst models.
//!
//! Contains data types used across the service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Subscription tier of a user.
///
/// Stored as text in `users.plan_tier`. New users start on `Trial`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    #[default]
    Trial,
    Basic,
    Pro,
    Enterprise,
}

impl PlanTier {
    /// Returns the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Trial => "trial",
            PlanTier::Basic => "basic",
            PlanTier::Pro => "pro",
            PlanTier::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown plan tier string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan tier: {0}")]
pub struct UnknownPlanTier(pub String);

impl FromStr for PlanTier {
    type Err = UnknownPlanTier;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(PlanTier::Trial),
            "basic" => Ok(PlanTier::Basic),
            "pro" => Ok(PlanTier::Pro),
            "enterprise" => Ok(PlanTier::Enterprise),
            other => Err(UnknownPlanTier(other.to_string())),
        }
    }
}

/// Row from the `users` table.
///
/// `external_subject_id` is the identity provider's `sub` and never changes
/// once written. `email` follows whatever the provider last reported.
#[derive(Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub external_subject_id: String,
    pub plan_tier: PlanTier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Custom Debug implementation that redacts personal identifiers.
impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("email", &"[REDACTED]")
            .field("external_subject_id", &"[REDACTED]")
            .field("plan_tier", &self.plan_tier)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Response body of `GET /api/v1/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: String,
    pub plan_tier: PlanTier,
    pub message: String,
}

impl From<UserRecord> for MeResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            message: format!("Hello {}!", user.email),
            user_id: user.id,
            email: user.email,
            plan_tier: user.plan_tier,
        }
    }
}

/// Body of a successful `/ready` probe. Failures are reported through
/// `ApiError::ServiceUnavailable`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: &'static str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn user() -> UserRecord {
        UserRecord {
            id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            external_subject_id: "abc123".to_string(),
            plan_tier: PlanTier::Trial,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_plan_tier_round_trips_through_db_string() {
        for tier in [
            PlanTier::Trial,
            PlanTier::Basic,
            PlanTier::Pro,
            PlanTier::Enterprise,
        ] {
            assert_eq!(tier.as_str().parse::<PlanTier>().unwrap(), tier);
        }
    }

    #[test]
    fn test_plan_tier_rejects_unknown() {
        assert_eq!(
            "platinum".parse::<PlanTier>(),
            Err(UnknownPlanTier("platinum".to_string()))
        );
        assert!("Trial".parse::<PlanTier>().is_err());
    }

    #[test]
    fn test_plan_tier_default_is_trial() {
        assert_eq!(PlanTier::default(), PlanTier::Trial);
    }

    #[test]
    fn test_plan_tier_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&PlanTier::Enterprise).unwrap(),
            "\"enterprise\""
        );
    }

    #[test]
    fn test_user_record_debug_redacts_identifiers() {
        let debug = format!("{:?}", user());

        assert!(!debug.contains("a@x.com"));
        assert!(!debug.contains("abc123"));
        assert!(debug.contains("Trial"));
    }

    #[test]
    fn test_me_response_from_user() {
        let user = user();
        let id = user.id;
        let response = MeResponse::from(user);

        assert_eq!(response.user_id, id);
        assert_eq!(response.message, "Hello a@x.com!");
        assert_eq!(response.plan_tier, PlanTier::Trial);
    }

    #[test]
    fn test_readiness_response_shape() {
        let json = serde_json::to_value(ReadinessResponse {
            status: "ready",
            database: "healthy",
        })
        .unwrap();

        assert_eq!(json, serde_json::json!({"status": "ready", "database": "healthy"}));
    }
}
