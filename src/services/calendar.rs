// SPDX-License-Identifier: MIT

//! Google Calendar API client and the per-user service wrapper.

use crate::error::AppError;
use crate::models::{CalendarEvent, CalendarEventInput};
use crate::services::token::TokenStore;
use crate::time_utils::format_utc_rfc3339;
use chrono::Utc;
use serde::Deserialize;
use std::time::Duration as StdDuration;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";
const DEFAULT_MAX_RESULTS: u32 = 10;
const HTTP_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Optional listing parameters. Missing fields fall back to the API
/// defaults: `timeMin` = now, `maxResults` = 10.
#[derive(Debug, Clone, Default)]
pub struct ListEventsParams {
    pub time_min: Option<String>,
    pub time_max: Option<String>,
    pub max_results: Option<u32>,
}

#[derive(Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<CalendarEvent>,
}

/// Thin HTTP client for the Calendar v3 events API.
#[derive(Clone)]
pub struct CalendarClient {
    http: reqwest::Client,
    base_url: String,
}

impl CalendarClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(HTTP_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: CALENDAR_API_BASE.to_string(),
        }
    }

    /// Override the API base URL (for tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// List events on the primary calendar, recurring ones expanded and
    /// ordered by start time.
    pub async fn list_events(
        &self,
        access_token: &str,
        params: &ListEventsParams,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        let max_results = params.max_results.unwrap_or(DEFAULT_MAX_RESULTS).to_string();
        let time_min = params
            .time_min
            .clone()
            .unwrap_or_else(|| format_utc_rfc3339(Utc::now()));

        let mut query: Vec<(&str, &str)> = vec![
            ("singleEvents", "true"),
            ("orderBy", "startTime"),
            ("maxResults", max_results.as_str()),
            ("timeMin", time_min.as_str()),
        ];
        if let Some(time_max) = params.time_max.as_deref() {
            query.push(("timeMax", time_max));
        }

        let response = self
            .http
            .get(format!("{}/calendars/primary/events", self.base_url))
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::CalendarApi(format!("Calendar request failed: {}", e)))?;

        let list: EventList = Self::parse_response(response).await?;
        Ok(list.items)
    }

    /// Create an event on the primary calendar.
    pub async fn insert_event(
        &self,
        access_token: &str,
        input: &CalendarEventInput,
    ) -> Result<CalendarEvent, AppError> {
        let response = self
            .http
            .post(format!("{}/calendars/primary/events", self.base_url))
            .bearer_auth(access_token)
            .json(&Self::event_body(input))
            .send()
            .await
            .map_err(|e| AppError::CalendarApi(format!("Calendar request failed: {}", e)))?;

        Self::parse_response(response).await
    }

    /// Partially update an existing event.
    pub async fn patch_event(
        &self,
        access_token: &str,
        event_id: &str,
        input: &CalendarEventInput,
    ) -> Result<CalendarEvent, AppError> {
        let response = self
            .http
            .patch(format!(
                "{}/calendars/primary/events/{}",
                self.base_url, event_id
            ))
            .bearer_auth(access_token)
            .json(&Self::event_body(input))
            .send()
            .await
            .map_err(|e| AppError::CalendarApi(format!("Calendar request failed: {}", e)))?;

        Self::parse_response(response).await
    }

    /// Delete an event from the primary calendar.
    pub async fn delete_event(&self, access_token: &str, event_id: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(format!(
                "{}/calendars/primary/events/{}",
                self.base_url, event_id
            ))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::CalendarApi(format!("Calendar request failed: {}", e)))?;

        Self::check_response(response).await
    }

    fn event_body(input: &CalendarEventInput) -> serde_json::Value {
        serde_json::json!({
            "summary": input.summary,
            "description": input.description,
            "start": { "dateTime": input.start },
            "end": { "dateTime": input.end },
        })
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }
        response
            .json()
            .await
            .map_err(|e| AppError::CalendarApi(format!("Failed to parse calendar response: {}", e)))
    }

    async fn check_response(response: reqwest::Response) -> Result<(), AppError> {
        let status = response.status();
        if !status.is_success() {
            return Err(Self::api_error(status, response).await);
        }
        Ok(())
    }

    async fn api_error(status: reqwest::StatusCode, response: reqwest::Response) -> AppError {
        let body: serde_json::Value = response.json().await.unwrap_or_default();
        let message = body
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .unwrap_or("Google Calendar request failed.")
            .to_string();
        tracing::error!(status = %status, message = %message, "Calendar API error");
        AppError::CalendarApi(message)
    }
}

impl Default for CalendarClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Calendar operations on behalf of a user. Resolves a valid access token
/// for every call.
#[derive(Clone)]
pub struct CalendarService {
    client: CalendarClient,
    tokens: TokenStore,
}

impl CalendarService {
    pub fn new(client: CalendarClient, tokens: TokenStore) -> Self {
        Self { client, tokens }
    }

    pub async fn list_events(
        &self,
        user_id: &str,
        params: &ListEventsParams,
    ) -> Result<Vec<CalendarEvent>, AppError> {
        let token = self.tokens.get_valid_access_token(user_id).await?;
        self.client.list_events(&token, params).await
    }

    pub async fn create_event(
        &self,
        user_id: &str,
        input: &CalendarEventInput,
    ) -> Result<CalendarEvent, AppError> {
        let token = self.tokens.get_valid_access_token(user_id).await?;
        self.client.insert_event(&token, input).await
    }

    pub async fn update_event(
        &self,
        user_id: &str,
        event_id: &str,
        input: &CalendarEventInput,
    ) -> Result<CalendarEvent, AppError> {
        let token = self.tokens.get_valid_access_token(user_id).await?;
        self.client.patch_event(&token, event_id, input).await
    }

    pub async fn delete_event(&self, user_id: &str, event_id: &str) -> Result<(), AppError> {
        let token = self.tokens.get_valid_access_token(user_id).await?;
        self.client.delete_event(&token, event_id).await
    }
}
