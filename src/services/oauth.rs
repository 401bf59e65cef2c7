// SPDX-License-Identifier: MIT

//! Google OAuth flow: authorization-URL issuance and the callback exchange.
//!
//! Handles:
//! - CSRF state creation and single-use consumption (10 minute TTL)
//! - Authorization code exchange at the token endpoint
//! - Refresh-token carry-over when Google omits one on re-consent

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{AuthState, TokenRecord};
use crate::services::token::{CachedToken, TokenCache};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;

const GOOGLE_AUTH_BASE: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const CALENDAR_SCOPE: &str = "https://www.googleapis.com/auth/calendar";

/// How long an issued CSRF state stays valid.
pub const STATE_TTL_MINUTES: i64 = 10;

const STATE_BYTES: usize = 16;
const HTTP_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Low-level client for Google's OAuth token endpoint.
#[derive(Clone)]
pub struct GoogleOAuthClient {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
}

impl GoogleOAuthClient {
    /// Create a new client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            token_url: GOOGLE_TOKEN_ENDPOINT.to_string(),
            client_id,
            client_secret,
        }
    }

    /// Override the token endpoint URL (for tests).
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        self.post_form(&[
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    /// Exchange a refresh token for a new access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.post_form(&[
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }

    async fn post_form(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let response = self
            .http
            .post(&self.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| AppError::ExchangeFailed(format!("Token endpoint request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            let detail = body
                .get("error_description")
                .and_then(|v| v.as_str())
                .or_else(|| body.get("error").and_then(|v| v.as_str()))
                .unwrap_or("Token endpoint returned an error")
                .to_string();
            tracing::error!(status = %status, detail = %detail, "Google token endpoint error");
            return Err(AppError::ExchangeFailed(detail));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::ExchangeFailed(format!("Failed to parse token response: {}", e)))
    }
}

/// Token endpoint response.
///
/// `refresh_token` is only present on the first consent (or when
/// `prompt=consent` forces reissuance); renewals usually omit it.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Orchestrates the authorization handshake: URL issuance and callback.
#[derive(Clone)]
pub struct OAuthService {
    client: GoogleOAuthClient,
    db: FirestoreDb,
    /// Shared with `TokenStore`; freshly exchanged tokens are cached here so
    /// the first calendar call after connecting skips a Firestore read.
    cache: TokenCache,
}

impl OAuthService {
    pub fn new(client: GoogleOAuthClient, db: FirestoreDb, cache: TokenCache) -> Self {
        Self { client, db, cache }
    }

    /// Generate an unguessable single-use state value.
    fn generate_state() -> Result<String, AppError> {
        use ring::rand::{SecureRandom, SystemRandom};

        let mut bytes = [0u8; STATE_BYTES];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate random state")))?;
        Ok(hex::encode(bytes))
    }

    /// Create an auth state for the user and build the Google consent URL.
    ///
    /// `prompt=consent` forces Google to reissue a refresh token even for
    /// users who already granted access.
    pub async fn begin_authorization(
        &self,
        user_id: &str,
        redirect_uri: &str,
    ) -> Result<String, AppError> {
        let state = Self::generate_state()?;
        let record = AuthState {
            user_id: user_id.to_string(),
            created_at: format_utc_rfc3339(Utc::now()),
        };
        self.db.put_auth_state(&state, &record).await?;

        let url = format!(
            "{}?client_id={}&\
             redirect_uri={}&\
             response_type=code&\
             access_type=offline&\
             prompt=consent&\
             include_granted_scopes=true&\
             scope={}&\
             state={}",
            GOOGLE_AUTH_BASE,
            urlencoding::encode(self.client.client_id()),
            urlencoding::encode(redirect_uri),
            urlencoding::encode(CALENDAR_SCOPE),
            state
        );

        tracing::info!(user_id, "Issued Google authorization URL");
        Ok(url)
    }

    /// Handle the OAuth callback: consume the state, exchange the code, and
    /// persist the token record. Returns the user the state was issued to.
    pub async fn complete_authorization(
        &self,
        code: &str,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, AppError> {
        let record = self
            .db
            .consume_auth_state(state)
            .await?
            .ok_or(AppError::InvalidOrExpiredState)?;

        let now = Utc::now();
        let created_at = DateTime::parse_from_rfc3339(&record.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now);
        if now - created_at > Duration::minutes(STATE_TTL_MINUTES) {
            // The record was already purged by the consume above.
            tracing::warn!(user_id = %record.user_id, "Auth state expired before callback");
            return Err(AppError::InvalidOrExpiredState);
        }

        let exchanged = self.client.exchange_code(code, redirect_uri).await?;
        let user_id = record.user_id;

        // Google omits refresh_token on repeat exchanges; carry over the
        // stored one and fail only when neither side has it.
        let existing = self.db.get_tokens(&user_id).await?;
        let refresh_token = exchanged
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                existing
                    .as_ref()
                    .map(|t| t.refresh_token.clone())
                    .filter(|t| !t.is_empty())
            })
            .ok_or(AppError::NoRefreshToken)?;

        let expiry_date = now + Duration::seconds(exchanged.expires_in);
        let tokens = TokenRecord {
            access_token: exchanged.access_token.clone(),
            refresh_token,
            expiry_date: format_utc_rfc3339(expiry_date),
            scope: exchanged
                .scope
                .clone()
                .or_else(|| existing.as_ref().and_then(|t| t.scope.clone())),
            token_type: exchanged
                .token_type
                .clone()
                .or_else(|| existing.as_ref().and_then(|t| t.token_type.clone())),
            updated_at: format_utc_rfc3339(now),
        };
        self.db.set_tokens(&user_id, &tokens).await?;

        self.cache.insert(
            user_id.clone(),
            CachedToken::new(exchanged.access_token, expiry_date),
        );

        tracing::info!(user_id = %user_id, "OAuth callback handled, tokens stored");
        Ok(user_id)
    }
}
