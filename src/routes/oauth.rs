// SPDX-License-Identifier: MIT

//! Google OAuth routes: authorization URL issuance and the popup callback.

use crate::error::Result;
use crate::middleware::auth::AuthUser;
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Routes reachable without a session. Google's redirect lands here.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/oauth/callback", get(oauth_callback))
}

/// Routes that require authentication (middleware applied in routes/mod.rs).
pub fn protected_routes() -> Router<Arc<AppState>> {
    Router::new().route("/oauth/url", get(get_auth_url))
}

/// Reconstruct this server's public callback URL from the request headers.
///
/// Behind Cloud Run / a load balancer the original scheme arrives in
/// `x-forwarded-proto`; direct localhost traffic stays plain http.
pub fn callback_redirect_uri(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost:8080");

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| {
            if host.starts_with("localhost") || host.starts_with("127.0.0.1") {
                "http".to_string()
            } else {
                "https".to_string()
            }
        });

    format!("{}://{}/oauth/callback", scheme, host)
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthUrlResponse {
    pub url: String,
}

/// Issue a Google consent URL bound to the current user.
async fn get_auth_url(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    headers: HeaderMap,
) -> Result<Json<AuthUrlResponse>> {
    let redirect_uri = callback_redirect_uri(&headers);
    let url = state
        .auth
        .begin_authorization(&user.user_id, &redirect_uri)
        .await?;
    Ok(Json(AuthUrlResponse { url }))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Handle Google's redirect back to us.
///
/// This renders a small HTML page inside the OAuth popup; on success it
/// notifies the opener window via postMessage and closes itself.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    if let Some(error) = params.error.as_deref() {
        tracing::warn!(error, "OAuth callback returned an error");
        return callback_page(
            StatusCode::BAD_REQUEST,
            "Connection failed",
            "Google reported an authorization error. You can close this window and try again.",
            false,
        );
    }

    let (code, csrf_state) = match (params.code.as_deref(), params.state.as_deref()) {
        (Some(code), Some(csrf_state)) if !code.is_empty() && !csrf_state.is_empty() => {
            (code, csrf_state)
        }
        _ => {
            return callback_page(
                StatusCode::BAD_REQUEST,
                "Missing data",
                "OAuth flow returned invalid data.",
                false,
            );
        }
    };

    let redirect_uri = callback_redirect_uri(&headers);
    match state
        .auth
        .complete_authorization(code, csrf_state, &redirect_uri)
        .await
    {
        Ok(_user_id) => callback_page(
            StatusCode::OK,
            "Calendar connected",
            "You can close this window.",
            true,
        ),
        Err(err) => {
            tracing::warn!(error = %err, "OAuth callback failed");
            callback_page(StatusCode::BAD_REQUEST, "Connection failed", &err.to_string(), false)
        }
    }
}

/// Render the popup result page. The success variant notifies the opener
/// and closes the window.
fn callback_page(status: StatusCode, title: &str, message: &str, success: bool) -> Response {
    let script = if success {
        r#"<script>
      window.opener?.postMessage({ type: "calendar-connected" }, "*");
      setTimeout(() => window.close(), 1500);
    </script>"#
    } else {
        ""
    };
    let badge = if success { "✓" } else { "✕" };
    let badge_class = if success { "ok" } else { "err" };

    let html = format!(
        r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>{title}</title>
    <style>
      body {{ font-family: system-ui, sans-serif; display: flex; align-items: center; justify-content: center; min-height: 100vh; margin: 0; background: #f6f7f9; }}
      .card {{ background: #fff; border-radius: 12px; padding: 32px 40px; box-shadow: 0 4px 16px rgba(0,0,0,.08); text-align: center; }}
      .badge {{ width: 48px; height: 48px; line-height: 48px; border-radius: 50%; margin: 0 auto 16px; font-size: 24px; color: #fff; }}
      .badge.ok {{ background: #22a06b; }}
      .badge.err {{ background: #d64545; }}
      h1 {{ font-size: 18px; margin: 0 0 8px; }}
      p {{ color: #555; margin: 0; }}
    </style>
  </head>
  <body>
    <div class="card">
      <div class="badge {badge_class}">{badge}</div>
      <h1>{title}</h1>
      <p>{message}</p>
    </div>
    {script}
  </body>
</html>"#
    );

    (status, Html(html)).into_response()
}
