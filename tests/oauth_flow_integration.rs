// SPDX-License-Identifier: MIT

//! OAuth handshake and token refresh against the Firestore emulator and a
//! mock Google token endpoint.
//!
//! Run with: ./scripts/test-with-emulator.sh

use chrono::{Duration, Utc};
use std::sync::Arc;
use taskcal::models::{AuthState, TokenRecord};
use taskcal::services::{GoogleOAuthClient, OAuthService, TokenStore};
use taskcal::time_utils::format_utc_rfc3339;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::test_db;

const REDIRECT_URI: &str = "http://localhost:8080/oauth/callback";

fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    format!(
        "test-user-{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

fn oauth_client(server: &MockServer) -> GoogleOAuthClient {
    GoogleOAuthClient::new("test-client-id".to_string(), "test-secret".to_string())
        .with_token_url(format!("{}/token", server.uri()))
}

fn fresh_state(user_id: &str) -> AuthState {
    AuthState {
        user_id: user_id.to_string(),
        created_at: format_utc_rfc3339(Utc::now()),
    }
}

#[tokio::test]
async fn callback_exchanges_code_and_stores_tokens() {
    require_emulator!();
    let server = MockServer::start().await;
    let db = test_db().await;
    let user_id = unique_user_id();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-abc",
            "refresh_token": "refresh-xyz",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = format!("state-{}", user_id);
    db.put_auth_state(&state, &fresh_state(&user_id)).await.unwrap();

    let cache = Arc::new(dashmap::DashMap::new());
    let service = OAuthService::new(oauth_client(&server), db.clone(), cache);

    let returned = service
        .complete_authorization("auth-code", &state, REDIRECT_URI)
        .await
        .unwrap();
    assert_eq!(returned, user_id);

    let stored = db.get_tokens(&user_id).await.unwrap().unwrap();
    assert_eq!(stored.access_token, "access-abc");
    assert_eq!(stored.refresh_token, "refresh-xyz");
}

#[tokio::test]
async fn replayed_state_is_rejected() {
    require_emulator!();
    let server = MockServer::start().await;
    let db = test_db().await;
    let user_id = unique_user_id();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-abc",
            "refresh_token": "refresh-xyz",
            "expires_in": 3599
        })))
        .mount(&server)
        .await;

    let state = format!("state-{}", user_id);
    db.put_auth_state(&state, &fresh_state(&user_id)).await.unwrap();

    let cache = Arc::new(dashmap::DashMap::new());
    let service = OAuthService::new(oauth_client(&server), db.clone(), cache);

    service
        .complete_authorization("auth-code", &state, REDIRECT_URI)
        .await
        .unwrap();

    let replay = service
        .complete_authorization("auth-code", &state, REDIRECT_URI)
        .await;
    assert!(replay.is_err());
}

#[tokio::test]
async fn expired_state_is_rejected_without_exchange() {
    require_emulator!();
    let server = MockServer::start().await;
    let db = test_db().await;
    let user_id = unique_user_id();

    // The token endpoint must never be hit for an expired state.
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-abc",
            "expires_in": 3599
        })))
        .expect(0)
        .mount(&server)
        .await;

    let state = format!("state-{}", user_id);
    let stale = AuthState {
        user_id: user_id.clone(),
        created_at: format_utc_rfc3339(Utc::now() - Duration::minutes(11)),
    };
    db.put_auth_state(&state, &stale).await.unwrap();

    let cache = Arc::new(dashmap::DashMap::new());
    let service = OAuthService::new(oauth_client(&server), db.clone(), cache);

    let result = service
        .complete_authorization("auth-code", &state, REDIRECT_URI)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn concurrent_calls_refresh_once() {
    require_emulator!();
    let server = MockServer::start().await;
    let db = test_db().await;
    let user_id = unique_user_id();

    // Stored token is already expired, forcing a refresh.
    let stale = TokenRecord {
        access_token: "access-old".to_string(),
        refresh_token: "refresh-xyz".to_string(),
        expiry_date: format_utc_rfc3339(Utc::now() - Duration::minutes(5)),
        scope: None,
        token_type: Some("Bearer".to_string()),
        updated_at: format_utc_rfc3339(Utc::now()),
    };
    db.set_tokens(&user_id, &stale).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-new",
            "expires_in": 3599
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cache = Arc::new(dashmap::DashMap::new());
    let locks = Arc::new(dashmap::DashMap::new());
    let store = TokenStore::new(oauth_client(&server), db.clone(), cache, locks);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let user_id = user_id.clone();
        handles.push(tokio::spawn(async move {
            store.get_valid_access_token(&user_id).await.unwrap()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), "access-new");
    }

    // The omitted refresh token must survive the merge.
    let stored = db.get_tokens(&user_id).await.unwrap().unwrap();
    assert_eq!(stored.refresh_token, "refresh-xyz");
    assert_eq!(stored.access_token, "access-new");
}

#[tokio::test]
async fn fresh_stored_token_is_served_without_refresh() {
    require_emulator!();
    let server = MockServer::start().await;
    let db = test_db().await;
    let user_id = unique_user_id();

    let fresh = TokenRecord {
        access_token: "access-good".to_string(),
        refresh_token: "refresh-xyz".to_string(),
        expiry_date: format_utc_rfc3339(Utc::now() + Duration::hours(1)),
        scope: None,
        token_type: Some("Bearer".to_string()),
        updated_at: format_utc_rfc3339(Utc::now()),
    };
    db.set_tokens(&user_id, &fresh).await.unwrap();

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let cache = Arc::new(dashmap::DashMap::new());
    let locks = Arc::new(dashmap::DashMap::new());
    let store = TokenStore::new(oauth_client(&server), db, cache, locks);

    let token = store.get_valid_access_token(&user_id).await.unwrap();
    assert_eq!(token, "access-good");
}
