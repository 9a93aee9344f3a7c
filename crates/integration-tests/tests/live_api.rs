//! Tests against a running Milo API.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (milo-cli migrate)
//! - The API server running (cargo run -p milo-api)
//!
//! Run with: cargo test -p milo-integration-tests -- --ignored

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use milo_integration_tests::TestContext;
use reqwest::StatusCode;
use serde_json::{Value, json};

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_health_endpoints() {
    let ctx = TestContext::from_env();

    let resp = ctx.client.get(ctx.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));

    let resp = ctx.client.get(ctx.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

// ============================================================================
// Sessions
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server with a seeded account"]
async fn test_login_issues_token_pair() {
    let ctx = TestContext::from_env();
    let session = ctx.login().await.unwrap();

    assert_eq!(session.token_type, "Bearer");
    assert_eq!(session.refresh_token.len(), 88);
    assert!(session.expires_in > 0);
    assert!(session.account["role"].is_string());
}

#[tokio::test]
#[ignore = "Requires running API server with a seeded account"]
async fn test_login_failures_are_indistinguishable() {
    let ctx = TestContext::from_env();
    let (email, _) = TestContext::credentials();

    let wrong = ctx.login_raw(&email, "definitely-wrong").await.unwrap();
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let wrong: Value = wrong.json().await.unwrap();

    let unknown = ctx
        .login_raw("nobody-here@milo.com", "definitely-wrong")
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    let unknown: Value = unknown.json().await.unwrap();

    assert_eq!(wrong, unknown);
}

#[tokio::test]
#[ignore = "Requires running API server with a seeded account"]
async fn test_refresh_rotates_and_logout_revokes() {
    let ctx = TestContext::from_env();
    let session = ctx.login().await.unwrap();

    let resp = ctx
        .client
        .post(ctx.url("/api/auth/refresh"))
        .json(&json!({ "refresh_token": session.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let rotated: Value = resp.json().await.unwrap();
    let next = rotated["refresh_token"].as_str().unwrap().to_owned();
    assert_ne!(next, session.refresh_token);

    let replay = ctx
        .client
        .post(ctx.url("/api/auth/refresh"))
        .json(&json!({ "refresh_token": session.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);

    let logout = ctx
        .client
        .post(ctx.url("/api/auth/logout"))
        .bearer_auth(rotated["access_token"].as_str().unwrap())
        .json(&json!({ "refresh_token": next }))
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    let after = ctx
        .client
        .post(ctx.url("/api/auth/refresh"))
        .json(&json!({ "refresh_token": next }))
        .send()
        .await
        .unwrap();
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running API server with a seeded account"]
async fn test_me_requires_bearer_token() {
    let ctx = TestContext::from_env();

    let anonymous = ctx.client.get(ctx.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let session = ctx.login().await.unwrap();
    let me: Value = ctx
        .client
        .get(ctx.url("/api/auth/me"))
        .bearer_auth(&session.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me["email"], session.account["email"]);
}

// ============================================================================
// Orders
// ============================================================================

#[tokio::test]
#[ignore = "Requires running API server"]
async fn test_status_catalogue() {
    let ctx = TestContext::from_env();

    let statuses: Vec<Value> = ctx
        .client
        .get(ctx.url("/api/orders/statuses"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(statuses.len(), 5);
    assert_eq!(statuses[0]["status"], "pending");
}

#[tokio::test]
#[ignore = "Requires running API server with a seeded account"]
async fn test_change_status_of_missing_order() {
    let ctx = TestContext::from_env();
    let session = ctx.login().await.unwrap();

    let resp = ctx
        .client
        .patch(ctx.url("/api/orders/2147483647/status"))
        .bearer_auth(&session.access_token)
        .json(&json!({ "status": "preparing" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
