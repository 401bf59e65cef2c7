// SPDX-License-Identifier: MIT

//! Calendar connection status and event CRUD, proxied for the current user.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{CalendarEvent, CalendarEventInput};
use crate::services::calendar::ListEventsParams;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/calendar/status", get(get_status))
        .route("/calendar/events", get(list_events))
        .route("/calendar/events", post(create_event))
        .route("/calendar/events/{event_id}", patch(update_event))
        .route("/calendar/events/{event_id}", delete(delete_event))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StatusResponse {
    pub connected: bool,
}

/// Whether the user has a stored Google token record.
async fn get_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatusResponse>> {
    let connected = state.db.get_tokens(&user.user_id).await?.is_some();
    Ok(Json(StatusResponse { connected }))
}

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(rename = "timeMin", default)]
    time_min: Option<String>,
    #[serde(rename = "timeMax", default)]
    time_max: Option<String>,
    #[serde(rename = "maxResults", default)]
    max_results: Option<u32>,
}

#[derive(Serialize)]
pub struct EventListResponse {
    pub items: Vec<CalendarEvent>,
}

async fn list_events(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<EventListResponse>> {
    let params = ListEventsParams {
        time_min: query.time_min,
        time_max: query.time_max,
        max_results: query.max_results,
    };
    let items = state.calendar.list_events(&user.user_id, &params).await?;
    Ok(Json(EventListResponse { items }))
}

/// Incoming event body. All fields optional so validation can produce a
/// consistent message instead of a serde rejection.
#[derive(Deserialize)]
pub struct EventBody {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    start: Option<String>,
    #[serde(default)]
    end: Option<String>,
}

impl EventBody {
    fn into_input(self) -> Result<CalendarEventInput> {
        let summary = self.summary.filter(|s| !s.trim().is_empty());
        let start = self.start.filter(|s| !s.is_empty());
        let end = self.end.filter(|s| !s.is_empty());
        match (summary, start, end) {
            (Some(summary), Some(start), Some(end)) => Ok(CalendarEventInput {
                summary,
                description: self.description.filter(|d| !d.is_empty()),
                start,
                end,
            }),
            _ => Err(AppError::BadRequest(
                "Missing event summary or time range.".to_string(),
            )),
        }
    }
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<EventBody>,
) -> Result<Json<CalendarEvent>> {
    let input = body.into_input()?;
    let event = state.calendar.create_event(&user.user_id, &input).await?;
    Ok(Json(event))
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
    Json(body): Json<EventBody>,
) -> Result<Json<CalendarEvent>> {
    let input = body.into_input()?;
    let event = state
        .calendar
        .update_event(&user.user_id, &event_id, &input)
        .await?;
    Ok(Json(event))
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

async fn delete_event(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(event_id): Path<String>,
) -> Result<Json<OkResponse>> {
    state.calendar.delete_event(&user.user_id, &event_id).await?;
    Ok(Json(OkResponse { ok: true }))
}
