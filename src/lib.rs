// SPDX-License-Identifier: MIT

//! Taskcal: keep a task list and a Google Calendar in step
//!
//! This crate provides the backend API for the task manager: Google OAuth
//! token lifecycle, calendar event proxying, and the bidirectional sync
//! pass that reconciles tasks with calendar events.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{CalendarService, OAuthService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub auth: OAuthService,
    pub calendar: CalendarService,
}
