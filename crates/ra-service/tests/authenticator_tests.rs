//! Request authenticator integration tests.
//!
//! Runs the full flow (header parsing, verification against a mocked
//! identity provider, user sync in Postgres).

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use ra_service::auth::{JwksClient, JwtValidator, RequestAuthenticator};
use ra_service::errors::Unauthenticated;
use ra_service::models::PlanTier;
use ra_service::repositories::UsersRepository;
use ra_service::services::PgUserResolver;
use ra_test_utils::{
    MockIdentityProvider, TestKeypair, TestTokenBuilder, TEST_CLIENT_ID, TEST_ISSUER, TEST_KID,
};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

fn authenticator(idp: &MockIdentityProvider, pool: &PgPool) -> RequestAuthenticator {
    let client = JwksClient::new(idp.jwks_url(), Duration::from_secs(1));
    let validator = Arc::new(JwtValidator::new(
        Arc::new(client),
        TEST_ISSUER.to_string(),
        TEST_CLIENT_ID.to_string(),
    ));
    RequestAuthenticator::new(validator, Arc::new(PgUserResolver::new(pool.clone())))
}

fn keypair() -> TestKeypair {
    TestKeypair::ed25519(1, TEST_KID).unwrap()
}

fn bearer(subject: &str, email: &str) -> String {
    let token = keypair()
        .sign(
            &TestTokenBuilder::new()
                .for_subject(subject)
                .with_email(email)
                .build(),
        )
        .unwrap();
    format!("Bearer {token}")
}

async fn user_count(pool: &PgPool) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_first_request_creates_trial_user(pool: PgPool) {
    let idp = MockIdentityProvider::start().await;
    idp.serve_keys(&[keypair().jwk_json()]).await;
    let authenticator = authenticator(&idp, &pool);

    let user = authenticator
        .authenticate(&bearer("abc123", "a@x.com"))
        .await
        .unwrap();

    assert_eq!(user.external_subject_id, "abc123");
    assert_eq!(user.email, "a@x.com");
    assert_eq!(user.plan_tier, PlanTier::Trial);
    assert_eq!(user_count(&pool).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_email_change_updates_same_user(pool: PgPool) {
    let idp = MockIdentityProvider::start().await;
    idp.serve_keys(&[keypair().jwk_json()]).await;
    let authenticator = authenticator(&idp, &pool);

    let first = authenticator
        .authenticate(&bearer("abc123", "a@x.com"))
        .await
        .unwrap();
    let second = authenticator
        .authenticate(&bearer("abc123", "b@x.com"))
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert_eq!(second.email, "b@x.com");

    let stored = UsersRepository::find_by_subject(&pool, "abc123")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.email, "b@x.com");
    assert_eq!(user_count(&pool).await, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_repeat_request_writes_nothing(pool: PgPool) {
    let idp = MockIdentityProvider::start().await;
    idp.serve_keys(&[keypair().jwk_json()]).await;
    let authenticator = authenticator(&idp, &pool);
    let header = bearer("abc123", "a@x.com");

    let first = authenticator.authenticate(&header).await.unwrap();
    let second = authenticator.authenticate(&header).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second.updated_at, first.updated_at);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_malformed_headers_make_no_network_call(pool: PgPool) {
    let idp = MockIdentityProvider::start().await;
    idp.expect_no_fetch().await;
    let authenticator = authenticator(&idp, &pool);
    let token = keypair().sign(&TestTokenBuilder::new().build()).unwrap();

    for header in [
        String::new(),
        "Bearer".to_string(),
        token.clone(),
        format!("Basic {token}"),
        format!("Bearer {token} extra"),
    ] {
        assert_eq!(
            authenticator.authenticate(&header).await,
            Err(Unauthenticated)
        );
    }

    assert_eq!(idp.request_count().await, 0);
    assert_eq!(user_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_lowercase_scheme_is_accepted(pool: PgPool) {
    let idp = MockIdentityProvider::start().await;
    idp.serve_keys(&[keypair().jwk_json()]).await;
    let authenticator = authenticator(&idp, &pool);
    let header = bearer("abc123", "a@x.com").replacen("Bearer", "bearer", 1);

    assert!(authenticator.authenticate(&header).await.is_ok());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_provider_down_is_unauthenticated(pool: PgPool) {
    let idp = MockIdentityProvider::start().await;
    idp.fail_with(500).await;
    let authenticator = authenticator(&idp, &pool);

    assert_eq!(
        authenticator.authenticate(&bearer("abc123", "a@x.com")).await,
        Err(Unauthenticated)
    );
    assert_eq!(user_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_missing_email_is_unauthenticated(pool: PgPool) {
    let idp = MockIdentityProvider::start().await;
    idp.serve_keys(&[keypair().jwk_json()]).await;
    let authenticator = authenticator(&idp, &pool);
    let token = keypair()
        .sign(&TestTokenBuilder::new().for_subject("abc123").without_email().build())
        .unwrap();

    assert_eq!(
        authenticator.authenticate(&format!("Bearer {token}")).await,
        Err(Unauthenticated)
    );
    assert_eq!(user_count(&pool).await, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_email_owned_by_other_subject_is_unauthenticated(pool: PgPool) {
    let idp = MockIdentityProvider::start().await;
    idp.serve_keys(&[keypair().jwk_json()]).await;
    let authenticator = authenticator(&idp, &pool);

    authenticator
        .authenticate(&bearer("abc123", "a@x.com"))
        .await
        .unwrap();

    assert_eq!(
        authenticator.authenticate(&bearer("def456", "a@x.com")).await,
        Err(Unauthenticated)
    );
    assert_eq!(user_count(&pool).await, 1);
}
