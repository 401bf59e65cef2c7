// SPDX-License-Identifier: MIT

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! Run with: ./scripts/test-with-emulator.sh
//!
//! The emulator provides a clean state for each test run.

use chrono::Utc;
use taskcal::models::{AuthState, SyncSource, Task, TaskDraft, TokenRecord};
use taskcal::time_utils::format_utc_rfc3339;

mod common;
use common::test_db;

/// Generate a unique user ID for test isolation.
fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    format!(
        "test-user-{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

fn test_tokens() -> TokenRecord {
    TokenRecord {
        access_token: "access-abc".to_string(),
        refresh_token: "refresh-xyz".to_string(),
        expiry_date: format_utc_rfc3339(Utc::now() + chrono::Duration::hours(1)),
        scope: Some("https://www.googleapis.com/auth/calendar".to_string()),
        token_type: Some("Bearer".to_string()),
        updated_at: format_utc_rfc3339(Utc::now()),
    }
}

fn test_task(user_id: &str, title: &str) -> Task {
    Task::from_draft(
        user_id,
        TaskDraft {
            title: title.to_string(),
            description: String::new(),
            category: "Test".to_string(),
            due_date: chrono::NaiveDate::from_ymd_opt(2026, 9, 10).unwrap(),
            due_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        },
        SyncSource::Local,
        None,
        Utc::now(),
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// AUTH STATE TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn auth_state_is_single_use() {
    require_emulator!();
    let db = test_db().await;
    let user_id = unique_user_id();

    let state = format!("state-{}", user_id);
    let record = AuthState {
        user_id: user_id.clone(),
        created_at: format_utc_rfc3339(Utc::now()),
    };
    db.put_auth_state(&state, &record).await.unwrap();

    let first = db.consume_auth_state(&state).await.unwrap();
    assert_eq!(first.map(|r| r.user_id), Some(user_id));

    // Second consume must see nothing.
    let second = db.consume_auth_state(&state).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn concurrent_consumes_yield_a_single_winner() {
    require_emulator!();
    let db = test_db().await;
    let user_id = unique_user_id();

    let state = format!("state-{}", user_id);
    let record = AuthState {
        user_id: user_id.clone(),
        created_at: format_utc_rfc3339(Utc::now()),
    };
    db.put_auth_state(&state, &record).await.unwrap();

    // Race several consumers of the same state. The transactional
    // read-then-delete must let exactly one observe the record.
    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = db.clone();
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            db.consume_auth_state(&state).await.unwrap()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn unknown_auth_state_consumes_to_none() {
    require_emulator!();
    let db = test_db().await;

    let result = db.consume_auth_state("never-issued").await.unwrap();
    assert!(result.is_none());
}

// ═══════════════════════════════════════════════════════════════════════════
// TOKEN TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn token_record_roundtrip() {
    require_emulator!();
    let db = test_db().await;
    let user_id = unique_user_id();

    assert!(db.get_tokens(&user_id).await.unwrap().is_none());

    let tokens = test_tokens();
    db.set_tokens(&user_id, &tokens).await.unwrap();

    let loaded = db.get_tokens(&user_id).await.unwrap().unwrap();
    assert_eq!(loaded.access_token, "access-abc");
    assert_eq!(loaded.refresh_token, "refresh-xyz");
    assert_eq!(loaded.token_type.as_deref(), Some("Bearer"));
}

#[tokio::test]
async fn token_update_overwrites_previous_record() {
    require_emulator!();
    let db = test_db().await;
    let user_id = unique_user_id();

    db.set_tokens(&user_id, &test_tokens()).await.unwrap();

    let mut updated = test_tokens();
    updated.access_token = "access-new".to_string();
    db.set_tokens(&user_id, &updated).await.unwrap();

    let loaded = db.get_tokens(&user_id).await.unwrap().unwrap();
    assert_eq!(loaded.access_token, "access-new");
}

// ═══════════════════════════════════════════════════════════════════════════
// TASK TESTS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn task_crud_roundtrip() {
    require_emulator!();
    let db = test_db().await;
    let user_id = unique_user_id();

    let task = test_task(&user_id, "Water plants");
    db.upsert_task(&task).await.unwrap();

    let loaded = db.get_task(&task.id).await.unwrap().unwrap();
    assert_eq!(loaded.title, "Water plants");
    assert_eq!(loaded.user_id, user_id);

    db.delete_task(&task.id).await.unwrap();
    assert!(db.get_task(&task.id).await.unwrap().is_none());
}

#[tokio::test]
async fn tasks_query_is_scoped_to_user() {
    require_emulator!();
    let db = test_db().await;
    let user_a = unique_user_id();
    let user_b = unique_user_id();

    db.upsert_task(&test_task(&user_a, "Mine")).await.unwrap();
    db.upsert_task(&test_task(&user_b, "Theirs")).await.unwrap();

    let tasks = db.get_tasks_for_user(&user_a).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Mine");
}

#[tokio::test]
async fn replace_tasks_deletes_removed_ones() {
    require_emulator!();
    let db = test_db().await;
    let user_id = unique_user_id();

    let keep = test_task(&user_id, "Keep");
    let removed = test_task(&user_id, "Drop");
    db.upsert_task(&keep).await.unwrap();
    db.upsert_task(&removed).await.unwrap();

    let new = test_task(&user_id, "New");
    db.replace_tasks(&user_id, &[keep.clone(), new.clone()])
        .await
        .unwrap();

    let tasks = db.get_tasks_for_user(&user_id).await.unwrap();
    let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(tasks.len(), 2);
    assert!(titles.contains(&"Keep"));
    assert!(titles.contains(&"New"));
    assert!(db.get_task(&removed.id).await.unwrap().is_none());
}
