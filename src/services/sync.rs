// SPDX-License-Identifier: MIT

//! Bidirectional task / calendar reconciliation.
//!
//! A sync pass pushes local tasks that have no event yet, then pulls events
//! in a bounded window and merges them back: matched tasks are updated in
//! place, unmatched events become new tasks, and calendar-sourced tasks
//! whose event vanished inside the window are pruned.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{
    default_due_time, CalendarEvent, CalendarEventInput, SyncSource, Task, TaskDraft,
};
use crate::services::calendar::{CalendarService, ListEventsParams};
use crate::time_utils::{format_local_rfc3339, format_utc_rfc3339, naive_local_to_utc};
use chrono::{DateTime, Duration, Local, NaiveDateTime, Timelike, Utc};
use std::collections::HashSet;

/// How far past the earliest due date a sync pass looks for events.
pub const SYNC_WINDOW_DAYS: i64 = 180;
pub const SYNC_MAX_RESULTS: u32 = 100;
/// Pushed tasks become events of this length.
pub const EVENT_DURATION_MINUTES: i64 = 60;

/// The window of event start times a sync pass covered. Pruning decisions
/// are only valid inside it.
#[derive(Debug, Clone, Copy)]
pub struct SyncRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
}

impl SyncRange {
    pub fn contains(&self, when: NaiveDateTime) -> bool {
        if let Some(start) = self.start {
            if when < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if when > end {
                return false;
            }
        }
        true
    }
}

/// Parse an event start into local naive time. Accepts both bare
/// `YYYY-MM-DDTHH:MM:SS` stamps and full RFC 3339 with an offset.
fn parse_event_datetime(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt);
    }
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Local).naive_local())
}

/// The local time a task's event starts at, if the event carries one.
fn event_start(event: &CalendarEvent) -> Option<NaiveDateTime> {
    let start = event.start.as_ref()?;
    if let Some(date_time) = start.date_time.as_deref() {
        return parse_event_datetime(date_time);
    }
    let date = start.date.as_deref()?;
    let due_date = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    Some(due_date.and_time(default_due_time()))
}

/// Translate an event into the task fields it controls.
fn event_to_task_draft(event: &CalendarEvent, now: DateTime<Utc>) -> TaskDraft {
    let title = event
        .summary
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Untitled event".to_string());
    let description = event.description.clone().unwrap_or_default();

    let (due_date, due_time) = match event_start(event) {
        Some(start) => (
            start.date(),
            // Seconds are noise for a due time.
            start.time().with_second(0).unwrap_or(start.time()),
        ),
        None => (
            now.with_timezone(&Local).date_naive(),
            default_due_time(),
        ),
    };

    TaskDraft {
        title,
        description,
        category: "Google Calendar".to_string(),
        due_date,
        due_time,
    }
}

/// Build the event payload for pushing a task to the calendar.
pub fn build_event_payload(task: &Task) -> CalendarEventInput {
    let start = task.due_datetime();
    let end = start + Duration::minutes(EVENT_DURATION_MINUTES);
    CalendarEventInput {
        summary: task.title.clone(),
        description: Some(task.description.clone()).filter(|d| !d.is_empty()),
        start: format_local_rfc3339(start),
        end: format_local_rfc3339(end),
    }
}

/// Merge a pulled event list into the user's tasks.
///
/// - Tasks already linked to a returned event take the event's title,
///   description, and times; completion state and category stay local.
/// - Events with no linked task become new calendar-sourced tasks, newest
///   first.
/// - Calendar-sourced tasks whose event is gone are removed, but only when
///   `range` is given and the task's due time falls inside it. Without a
///   range no task is pruned.
pub fn merge_tasks_from_events(
    user_id: &str,
    tasks: Vec<Task>,
    events: &[CalendarEvent],
    range: Option<&SyncRange>,
    now: DateTime<Utc>,
) -> Vec<Task> {
    let event_ids: HashSet<&str> = events.iter().map(|e| e.id.as_str()).collect();

    let mut merged: Vec<Task> = tasks
        .into_iter()
        .filter(|task| {
            if task.sync_source != SyncSource::Google {
                return true;
            }
            // A task with no event link has nothing to check against; only a
            // linked task whose event vanished counts as deleted remotely.
            let event_gone = task
                .google_event_id
                .as_deref()
                .map(|id| !event_ids.contains(id))
                .unwrap_or(false);
            if !event_gone {
                return true;
            }
            // Absence outside the pulled window proves nothing.
            !range
                .map(|r| r.contains(task.due_datetime()))
                .unwrap_or(false)
        })
        .collect();

    for event in events {
        let draft = event_to_task_draft(event, now);
        if let Some(task) = merged
            .iter_mut()
            .find(|t| t.google_event_id.as_deref() == Some(event.id.as_str()))
        {
            task.title = draft.title;
            task.description = draft.description;
            task.due_date = draft.due_date;
            task.due_time = draft.due_time;
            task.updated_at = format_utc_rfc3339(now);
        } else {
            merged.insert(
                0,
                Task::from_draft(
                    user_id,
                    draft,
                    SyncSource::Google,
                    Some(event.id.clone()),
                    now,
                ),
            );
        }
    }

    merged
}

/// Run a full sync pass for a user and persist the result.
pub async fn sync_user_tasks(
    calendar: &CalendarService,
    db: &FirestoreDb,
    user_id: &str,
) -> Result<Vec<Task>, AppError> {
    let mut tasks = db.get_tasks_for_user(user_id).await?;
    let now = Utc::now();

    // Push phase: give every unsynced task an event.
    for task in tasks.iter_mut().filter(|t| t.google_event_id.is_none()) {
        let created = calendar
            .create_event(user_id, &build_event_payload(task))
            .await?;
        task.google_event_id = Some(created.id);
        task.updated_at = format_utc_rfc3339(now);
    }

    // Pull phase: a 180-day window anchored at the earliest due date.
    let window_start = tasks
        .iter()
        .map(|t| t.due_datetime())
        .min()
        .unwrap_or_else(|| now.with_timezone(&Local).naive_local());
    let window_end = window_start + Duration::days(SYNC_WINDOW_DAYS);

    let events = calendar
        .list_events(
            user_id,
            &ListEventsParams {
                time_min: Some(format_utc_rfc3339(naive_local_to_utc(window_start))),
                time_max: Some(format_utc_rfc3339(naive_local_to_utc(window_end))),
                max_results: Some(SYNC_MAX_RESULTS),
            },
        )
        .await?;
    let pulled = events.len();

    let range = SyncRange {
        start: Some(window_start),
        end: Some(window_end),
    };
    let merged = merge_tasks_from_events(user_id, tasks, &events, Some(&range), now);

    db.replace_tasks(user_id, &merged).await?;

    tracing::info!(
        user_id,
        pulled,
        total = merged.len(),
        "Sync pass complete"
    );
    Ok(merged)
}
