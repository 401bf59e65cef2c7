// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid or expired session. Please try again.")]
    InvalidOrExpiredState,

    #[error("Unable to exchange OAuth code: {0}")]
    ExchangeFailed(String),

    #[error("No refresh token returned. Revoke access and try again.")]
    NoRefreshToken,

    #[error("Google Calendar is not connected.")]
    NotConnected,

    #[error("Missing Google refresh token.")]
    MissingRefreshToken,

    #[error("Google Calendar API error: {0}")]
    CalendarApi(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "invalid_token", None),
            AppError::InvalidOrExpiredState => (
                StatusCode::BAD_REQUEST,
                "invalid_state",
                Some(self.to_string()),
            ),
            AppError::ExchangeFailed(msg) => (
                StatusCode::BAD_REQUEST,
                "exchange_failed",
                Some(msg.clone()),
            ),
            AppError::NoRefreshToken => (
                StatusCode::BAD_REQUEST,
                "no_refresh_token",
                Some(self.to_string()),
            ),
            AppError::NotConnected => (
                StatusCode::BAD_REQUEST,
                "not_connected",
                Some(self.to_string()),
            ),
            AppError::MissingRefreshToken => (
                StatusCode::BAD_REQUEST,
                "missing_refresh_token",
                Some(self.to_string()),
            ),
            AppError::CalendarApi(msg) => {
                (StatusCode::BAD_GATEWAY, "calendar_error", Some(msg.clone()))
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
