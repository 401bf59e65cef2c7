// SPDX-License-Identifier: MIT

//! Services module - business logic layer.

pub mod calendar;
pub mod oauth;
pub mod sync;
pub mod token;

pub use calendar::{CalendarClient, CalendarService, ListEventsParams};
pub use oauth::{GoogleOAuthClient, OAuthService, TokenResponse};
pub use token::{CachedToken, RefreshLocks, TokenCache, TokenStore};
