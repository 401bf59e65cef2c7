// SPDX-License-Identifier: MIT

//! Taskcal API Server
//!
//! Backend for the task manager: handles the Google OAuth handshake, keeps
//! access tokens fresh, and syncs tasks with Google Calendar events.

use std::sync::Arc;
use taskcal::{
    config::Config,
    db::FirestoreDb,
    services::{CalendarClient, CalendarService, GoogleOAuthClient, OAuthService, TokenStore},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Taskcal API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize shared token cache and refresh locks
    // Shared between the OAuth callback and the token store so a freshly
    // exchanged token is visible to calendar calls immediately
    let token_cache = Arc::new(dashmap::DashMap::new());
    let refresh_locks = Arc::new(dashmap::DashMap::new());
    tracing::info!("Token cache initialized");

    let oauth_client = GoogleOAuthClient::new(
        config.google_client_id.clone(),
        config.google_client_secret.clone(),
    );
    let auth = OAuthService::new(oauth_client.clone(), db.clone(), token_cache.clone());
    let tokens = TokenStore::new(oauth_client, db.clone(), token_cache, refresh_locks);
    let calendar = CalendarService::new(CalendarClient::new(), tokens);

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        auth,
        calendar,
    });

    // Build router
    let app = taskcal::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskcal=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
