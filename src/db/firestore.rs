// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Auth states (single-use OAuth CSRF tokens)
//! - Token records (per-user OAuth credentials)
//! - Tasks (the user's task collection)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{AuthState, Task, TokenRecord};
use futures_util::{stream, StreamExt};
use std::collections::HashSet;

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Auth State Operations ───────────────────────────────────

    /// Store a pending OAuth CSRF state, keyed by the state value.
    pub async fn put_auth_state(&self, state: &str, record: &AuthState) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::AUTH_STATES)
            .document_id(state)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Atomically fetch and delete an auth state.
    ///
    /// Read and delete happen inside one Firestore transaction, with the
    /// read bound to it, so two concurrent callbacks presenting the same
    /// state cannot both succeed: the loser aborts at the read or at commit
    /// and observes `None`.
    pub async fn consume_auth_state(&self, state: &str) -> Result<Option<AuthState>, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // The read must go through the transaction to register the document
        // for conflict detection; a plain read would let two concurrent
        // consumes both commit their deletes.
        let tx_client = client.clone_with_consistency_selector(
            firestore::FirestoreConsistencySelector::Transaction(
                transaction.transaction_id().clone(),
            ),
        );

        let read = tx_client
            .fluent()
            .select()
            .by_id_in(collections::AUTH_STATES)
            .obj::<AuthState>()
            .one(state)
            .await;

        let record = match read {
            Ok(record) => record,
            // A retryable abort here means another consume holds the lock on
            // this document; this caller lost the race.
            Err(firestore::errors::FirestoreError::DatabaseError(ref db_err))
                if db_err.retry_possible =>
            {
                let _ = transaction.rollback().await;
                tracing::warn!("Auth state read lost a concurrent race");
                return Ok(None);
            }
            Err(e) => return Err(AppError::Database(e.to_string())),
        };

        let Some(record) = record else {
            let _ = transaction.rollback().await;
            return Ok(None);
        };

        client
            .fluent()
            .delete()
            .from(collections::AUTH_STATES)
            .document_id(state)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add state deletion to transaction: {}", e))
            })?;

        if let Err(e) = transaction.commit().await {
            tracing::warn!(error = %e, "Auth state consume lost a concurrent race");
            return Ok(None);
        }

        Ok(Some(record))
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get the OAuth token record for a user.
    pub async fn get_tokens(&self, user_id: &str) -> Result<Option<TokenRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOKENS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store the OAuth token record for a user.
    ///
    /// Callers construct the full merged record (see `TokenStore`); the
    /// stored refresh token must never be replaced with an absent value.
    pub async fn set_tokens(&self, user_id: &str, tokens: &TokenRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TOKENS)
            .document_id(user_id)
            .object(tokens)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Task Operations ─────────────────────────────────────────

    /// Get a task by ID.
    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TASKS)
            .obj()
            .one(task_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all tasks for a user, most recently updated first.
    pub async fn get_tasks_for_user(&self, user_id: &str) -> Result<Vec<Task>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TASKS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .order_by([(
                "updated_at",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a task.
    pub async fn upsert_task(&self, task: &Task) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TASKS)
            .document_id(&task.id)
            .object(task)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a task.
    pub async fn delete_task(&self, task_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::TASKS)
            .document_id(task_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Replace a user's task collection with the given set.
    ///
    /// Upserts every task in `tasks` (bounded concurrency) and deletes the
    /// user's tasks that are no longer present, e.g. pruned by a sync merge.
    pub async fn replace_tasks(&self, user_id: &str, tasks: &[Task]) -> Result<(), AppError> {
        let client = self.get_client()?;

        stream::iter(tasks.to_vec())
            .map(|task| async move {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::TASKS)
                    .document_id(&task.id)
                    .object(&task)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        let keep: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        let removed: Vec<Task> = self
            .get_tasks_for_user(user_id)
            .await?
            .into_iter()
            .filter(|t| !keep.contains(t.id.as_str()))
            .collect();

        if !removed.is_empty() {
            tracing::debug!(
                user_id,
                count = removed.len(),
                "Deleting tasks pruned by sync"
            );
            self.batch_delete(&removed, collections::TASKS, |t: &Task| t.id.clone())
                .await?;
        }

        Ok(())
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}
