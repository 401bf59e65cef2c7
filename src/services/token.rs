// SPDX-License-Identifier: MIT

//! Access-token lifecycle: cache, expiry-skew check, and single-flight
//! refresh against Google's token endpoint.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::TokenRecord;
use crate::services::oauth::{GoogleOAuthClient, TokenResponse};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Tokens within this many seconds of expiry are treated as already expired,
/// so a request never goes out with a token that dies in flight.
pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

/// In-memory copy of an access token and its expiry.
#[derive(Clone)]
pub struct CachedToken {
    pub(crate) access_token: String,
    pub(crate) expiry_date: DateTime<Utc>,
}

impl CachedToken {
    pub fn new(access_token: String, expiry_date: DateTime<Utc>) -> Self {
        Self {
            access_token,
            expiry_date,
        }
    }
}

/// Shared cache of access tokens, keyed by user id.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// Per-user refresh locks so concurrent requests trigger one refresh.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Returns a valid access token for a user, refreshing when needed.
#[derive(Clone)]
pub struct TokenStore {
    oauth: GoogleOAuthClient,
    db: FirestoreDb,
    cache: TokenCache,
    locks: RefreshLocks,
}

/// A token is fresh when it outlives the skew window.
pub fn is_fresh(expiry: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now + Duration::seconds(TOKEN_EXPIRY_SKEW_SECS) < expiry
}

/// Fold a refresh response into the stored record. The stored refresh token
/// survives unless Google sent a non-empty replacement.
fn merge_refreshed(record: &TokenRecord, refreshed: &TokenResponse, now: DateTime<Utc>) -> TokenRecord {
    TokenRecord {
        access_token: refreshed.access_token.clone(),
        refresh_token: refreshed
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| record.refresh_token.clone()),
        expiry_date: format_utc_rfc3339(now + Duration::seconds(refreshed.expires_in)),
        scope: refreshed.scope.clone().or_else(|| record.scope.clone()),
        token_type: refreshed
            .token_type
            .clone()
            .or_else(|| record.token_type.clone()),
        updated_at: format_utc_rfc3339(now),
    }
}

impl TokenStore {
    pub fn new(
        oauth: GoogleOAuthClient,
        db: FirestoreDb,
        cache: TokenCache,
        locks: RefreshLocks,
    ) -> Self {
        Self {
            oauth,
            db,
            cache,
            locks,
        }
    }

    /// Get a usable access token for the user.
    ///
    /// Fast path is the in-memory cache. On a miss or a stale entry, one
    /// caller per user performs the Firestore read and (if needed) the
    /// refresh while the rest wait on the per-user lock and pick up the
    /// cached result.
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String, AppError> {
        if let Some(cached) = self.cache.get(user_id) {
            if is_fresh(cached.expiry_date, Utc::now()) {
                return Ok(cached.access_token.clone());
            }
        }

        let lock = self
            .locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another holder may have refreshed while this caller waited.
        if let Some(cached) = self.cache.get(user_id) {
            if is_fresh(cached.expiry_date, Utc::now()) {
                return Ok(cached.access_token.clone());
            }
        }

        let record = self
            .db
            .get_tokens(user_id)
            .await?
            .ok_or(AppError::NotConnected)?;

        let now = Utc::now();
        let expiry = DateTime::parse_from_rfc3339(&record.expiry_date)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);

        if !record.access_token.is_empty() && is_fresh(expiry, now) {
            self.cache.insert(
                user_id.to_string(),
                CachedToken::new(record.access_token.clone(), expiry),
            );
            return Ok(record.access_token);
        }

        if record.refresh_token.is_empty() {
            return Err(AppError::MissingRefreshToken);
        }

        tracing::debug!(user_id, "Access token stale, refreshing");
        let refreshed = self.oauth.refresh_token(&record.refresh_token).await?;
        let merged = merge_refreshed(&record, &refreshed, now);
        self.db.set_tokens(user_id, &merged).await?;

        let new_expiry = now + Duration::seconds(refreshed.expires_in);
        self.cache.insert(
            user_id.to_string(),
            CachedToken::new(merged.access_token.clone(), new_expiry),
        );

        Ok(merged.access_token)
    }
}
