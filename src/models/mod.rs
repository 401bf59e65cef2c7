// SPDX-License-Identifier: MIT

//! Data models for the application.

pub mod event;
pub mod task;
pub mod token;

pub use event::{CalendarEvent, CalendarEventInput, EventTime};
pub use task::{default_due_time, SyncSource, Task, TaskDraft};
pub use token::{AuthState, TokenRecord};
