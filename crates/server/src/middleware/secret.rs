//! Shared-secret check (§6 "Secret check"), applied to `/render` and `/flush`
//! only. `/_api/*` and `/_ah/*` are exempt.
//!
//! The secret file is read once and cached; a later request never re-reads
//! it. Checking the secret means peeking at the JSON body's `secret` field
//! before the handler proper runs, so the body is buffered here and handed
//! back to the request unchanged for the downstream extractor.

use std::path::PathBuf;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::OnceCell;

use ssrender_core::ErrorBody;

use crate::state::AppState;

/// Matches the request-body limit enforced by `RequestBodyLimitLayer` (§6).
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("File not found")]
    FileNotFound,
    #[error("secret file is empty!")]
    EmptyFile,
    #[error("Missing or invalid secret")]
    Mismatch,
    #[error("request body is not valid JSON")]
    MalformedBody,
}

impl IntoResponse for SecretError {
    fn into_response(self) -> Response {
        match self {
            Self::FileNotFound | Self::EmptyFile => {
                tracing::error!(error = %self, "secret file misconfigured");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::simple(self.to_string())),
                )
                    .into_response()
            }
            Self::Mismatch | Self::MalformedBody => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::simple("Missing or invalid secret")),
            )
                .into_response(),
        }
    }
}

/// Caches the shared secret after its first successful read from disk.
pub struct SecretStore {
    secret_file: Option<PathBuf>,
    dev_mode: bool,
    cached: OnceCell<String>,
}

impl SecretStore {
    pub fn new(secret_file: Option<PathBuf>, dev_mode: bool) -> Self {
        Self {
            secret_file,
            dev_mode,
            cached: OnceCell::new(),
        }
    }

    /// Check a request-supplied secret against the configured file. Always
    /// passes in dev mode.
    pub async fn check(&self, provided: Option<&str>) -> Result<(), SecretError> {
        if self.dev_mode {
            return Ok(());
        }

        let expected = self
            .cached
            .get_or_try_init(|| async {
                let path = self.secret_file.as_ref().ok_or(SecretError::FileNotFound)?;
                let contents = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|_| SecretError::FileNotFound)?;
                let trimmed = contents.trim().to_string();
                if trimmed.is_empty() {
                    return Err(SecretError::EmptyFile);
                }
                Ok(trimmed)
            })
            .await?;

        match provided {
            Some(p) if p == expected => Ok(()),
            _ => Err(SecretError::Mismatch),
        }
    }
}

/// `axum::middleware::from_fn_with_state` guard: buffers the request body,
/// checks its `secret` field, and passes the body through unchanged.
pub async fn require_secret(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(_) => return SecretError::MalformedBody.into_response(),
    };

    let secret = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|v| v.get("secret").and_then(|s| s.as_str().map(str::to_string)));

    if let Err(e) = state.secret_store.check(secret.as_deref()).await {
        return e.into_response();
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}
