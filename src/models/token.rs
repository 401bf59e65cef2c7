// SPDX-License-Identifier: MIT

//! OAuth credential models stored in Firestore.

use serde::{Deserialize, Serialize};

/// A user's Google OAuth tokens, one document per user.
///
/// `refresh_token`, once set, is never overwritten with an absent value:
/// renewals that omit a new refresh token preserve the existing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// When the access token expires (RFC3339)
    pub expiry_date: String,
    /// Granted OAuth scope
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Last write time (RFC3339)
    pub updated_at: String,
}

/// A pending CSRF state for the OAuth handshake, keyed by the state value.
///
/// Single-use: consumed (deleted) on the first callback that presents it,
/// or purged after the 10-minute TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthState {
    /// The user who requested the authorization URL
    pub user_id: String,
    /// When the state was issued (RFC3339)
    pub created_at: String,
}
