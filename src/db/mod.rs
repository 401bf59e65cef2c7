// SPDX-License-Identifier: MIT

//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// Outstanding OAuth CSRF states (keyed by state value, 10 min TTL)
    pub const AUTH_STATES: &str = "calendar_auth_states";
    /// Per-user OAuth token records (keyed by user ID)
    pub const TOKENS: &str = "calendar_tokens";
    /// Tasks (keyed by task ID, with a user_id field)
    pub const TASKS: &str = "tasks";
}
