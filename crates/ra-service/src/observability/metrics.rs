//! Metrics definitions for the authentication flow.
//!
//! All metrics follow Prometheus naming conventions:
//! - `ra_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Every label value comes from a fixed set in code:
//! - `status`: success, error
//! - `outcome`: success, malformed_header, or an `AuthError::cause()` label
//! - `action`: created, updated, unchanged, or an `AuthError::cause()` label
//! - `operation`: bounded by repository functions

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle used by
/// the `/metrics` endpoint.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("ra_jwks_refresh".to_string()),
            &[0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("ra_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

/// Record a JWKS fetch from the identity provider.
///
/// Metric: `ra_jwks_refresh_total`, `ra_jwks_refresh_duration_seconds`
/// Labels: `status`
pub fn record_jwks_refresh(status: &str, duration: Duration) {
    histogram!("ra_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    counter!("ra_jwks_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a token verification result.
///
/// Metric: `ra_token_validations_total`
/// Labels: `outcome`
pub fn record_token_validation(outcome: &str) {
    counter!("ra_token_validations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record what the user resolver did for one call.
///
/// Metric: `ra_user_sync_total`
/// Labels: `action`
pub fn record_user_sync(action: &str) {
    counter!("ra_user_sync_total",
        "action" => action.to_string()
    )
    .increment(1);
}

/// Record the collapsed outcome of one `authenticate` call.
///
/// Metric: `ra_auth_requests_total`
/// Labels: `outcome`
pub fn record_auth_request(outcome: &str) {
    counter!("ra_auth_requests_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a database query.
///
/// Metric: `ra_db_query_duration_seconds`, `ra_db_queries_total`
/// Labels: `operation`, `status`
pub fn record_db_query(operation: &str, status: &str, duration: Duration) {
    histogram!("ra_db_query_duration_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("ra_db_queries_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
