// SPDX-License-Identifier: MIT

use std::sync::Arc;
use taskcal::config::Config;
use taskcal::db::FirestoreDb;
use taskcal::routes::create_router;
use taskcal::services::{CalendarClient, CalendarService, GoogleOAuthClient, OAuthService, TokenStore};
use taskcal::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let db = test_db_offline();

    let token_cache = Arc::new(dashmap::DashMap::new());
    let refresh_locks = Arc::new(dashmap::DashMap::new());

    let oauth_client = GoogleOAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );
    let auth = OAuthService::new(oauth_client.clone(), db.clone(), token_cache.clone());
    let tokens = TokenStore::new(oauth_client, db.clone(), token_cache, refresh_locks);
    let calendar = CalendarService::new(CalendarClient::new(), tokens);

    let state = Arc::new(AppState {
        config,
        db,
        auth,
        calendar,
    });

    (create_router(state.clone()), state)
}
