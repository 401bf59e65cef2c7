// SPDX-License-Identifier: MIT

//! Task model for storage and API.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a task originated. Tasks pulled down from Google Calendar are
/// eligible for pruning when their backing event disappears; locally created
/// tasks never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncSource {
    Local,
    Google,
}

/// Fallback time-of-day for tasks and all-day events.
pub fn default_due_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap()
}

/// A task in the user's collection, stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Task ID (also the document ID)
    pub id: String,
    /// Owning user ID
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    /// Calendar date the task is due
    pub due_date: NaiveDate,
    /// Time of day the task is due (defaults to 09:00)
    #[serde(default = "default_due_time")]
    pub due_time: NaiveTime,
    #[serde(default)]
    pub is_completed: bool,
    /// Weak back-reference to the remote calendar event, when synced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_event_id: Option<String>,
    pub sync_source: SyncSource,
    /// Last modification time (RFC3339)
    pub updated_at: String,
}

/// Input for creating a task, before an ID and timestamps are assigned.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub category: String,
    pub due_date: NaiveDate,
    pub due_time: NaiveTime,
}

impl Task {
    /// Build a new local task from a draft.
    pub fn new(user_id: &str, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self::from_draft(user_id, draft, SyncSource::Local, None, now)
    }

    /// Build a task from a draft with an explicit origin.
    pub fn from_draft(
        user_id: &str,
        draft: TaskDraft,
        sync_source: SyncSource,
        google_event_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            category: draft.category.trim().to_string(),
            due_date: draft.due_date,
            due_time: draft.due_time,
            is_completed: false,
            google_event_id,
            sync_source,
            updated_at: crate::time_utils::format_utc_rfc3339(now),
        }
    }

    /// The task's due timestamp as naive local wall-clock time.
    pub fn due_datetime(&self) -> NaiveDateTime {
        self.due_date.and_time(self.due_time)
    }
}
