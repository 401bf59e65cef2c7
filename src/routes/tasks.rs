// SPDX-License-Identifier: MIT

//! Task CRUD and the sync endpoint.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Task, TaskDraft};
use crate::services::sync::sync_user_tasks;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get, patch, post},
    Extension, Json, Router,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", get(list_tasks))
        .route("/tasks", post(create_task))
        .route("/tasks/{task_id}", patch(update_task))
        .route("/tasks/{task_id}", delete(delete_task))
        .route("/tasks/sync", post(sync_tasks))
}

#[derive(Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
}

async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TaskListResponse>> {
    let tasks = state.db.get_tasks_for_user(&user.user_id).await?;
    Ok(Json(TaskListResponse { tasks }))
}

fn parse_due_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| AppError::BadRequest("Add a title, date, and time for the task.".to_string()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: String,
    due_date: NaiveDate,
    due_time: String,
}

async fn create_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Json<Task>> {
    if body.title.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Add a title, date, and time for the task.".to_string(),
        ));
    }
    let due_time = parse_due_time(&body.due_time)?;

    let task = Task::new(
        &user.user_id,
        TaskDraft {
            title: body.title,
            description: body.description,
            category: body.category,
            due_date: body.due_date,
            due_time,
        },
        Utc::now(),
    );
    state.db.upsert_task(&task).await?;
    Ok(Json(task))
}

/// Partial update. Absent fields keep their current value.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    due_date: Option<NaiveDate>,
    #[serde(default)]
    due_time: Option<String>,
    #[serde(default)]
    is_completed: Option<bool>,
}

async fn update_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<String>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<Task>> {
    let mut task = state
        .db
        .get_task(&task_id)
        .await?
        .filter(|t| t.user_id == user.user_id)
        .ok_or_else(|| AppError::NotFound("Task not found.".to_string()))?;

    if let Some(title) = body.title {
        if title.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Add a title, date, and time for the task.".to_string(),
            ));
        }
        task.title = title.trim().to_string();
    }
    if let Some(description) = body.description {
        task.description = description.trim().to_string();
    }
    if let Some(category) = body.category {
        task.category = category.trim().to_string();
    }
    if let Some(due_date) = body.due_date {
        task.due_date = due_date;
    }
    if let Some(due_time) = body.due_time {
        task.due_time = parse_due_time(&due_time)?;
    }
    if let Some(is_completed) = body.is_completed {
        task.is_completed = is_completed;
    }
    task.updated_at = format_utc_rfc3339(Utc::now());

    state.db.upsert_task(&task).await?;
    Ok(Json(task))
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

async fn delete_task(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(task_id): Path<String>,
) -> Result<Json<OkResponse>> {
    let task = state
        .db
        .get_task(&task_id)
        .await?
        .filter(|t| t.user_id == user.user_id)
        .ok_or_else(|| AppError::NotFound("Task not found.".to_string()))?;

    state.db.delete_task(&task.id).await?;
    Ok(Json(OkResponse { ok: true }))
}

/// Run a full push/pull sync pass and return the merged task list.
async fn sync_tasks(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<TaskListResponse>> {
    let tasks = sync_user_tasks(&state.calendar, &state.db, &user.user_id).await?;
    Ok(Json(TaskListResponse { tasks }))
}
