//! Render errors including I/O operations (§7 "Error handling design").

use ssrender_core::RenderCoreError;
use thiserror::Error;

/// Render errors including I/O operations.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Core error: {0}")]
    Core(#[from] RenderCoreError),

    #[error("Failed to fetch package {url}: {cause} (last status: {last_status:?})")]
    Fetch {
        url: String,
        last_status: Option<u16>,
        cause: String,
    },

    #[error("JavaScript execution error: {0}")]
    JsExecution(String),

    #[error("entry point did not call __registerForSSR__")]
    NotRegistered,

    #[error("render callback rejected: {0}")]
    CallbackRejected(String),

    #[error("Worker channel closed")]
    ChannelClosed,

    #[error("Render timeout after {0}ms")]
    Timeout(u64),

    #[error("Service overloaded, retry after {retry_after_secs}s")]
    Overloaded { retry_after_secs: u32 },
}

pub type Result<T> = std::result::Result<T, RenderError>;

impl RenderError {
    /// Whether this error belongs to the InputError (400) class or the
    /// FetchError/SandboxError (500) class, per §7's taxonomy.
    pub fn is_input_error(&self) -> bool {
        matches!(self, RenderError::Core(_))
    }

    /// The structured-log tag this error should be reported under, if any
    /// (`FETCH FAIL` / `RENDER FAIL`, per §6's stable log-line format).
    pub fn log_tag(&self) -> Option<&'static str> {
        match self {
            RenderError::Fetch { .. } => Some("FETCH FAIL"),
            RenderError::JsExecution(_)
            | RenderError::NotRegistered
            | RenderError::CallbackRejected(_)
            | RenderError::Timeout(_) => Some("RENDER FAIL"),
            RenderError::Core(_) | RenderError::ChannelClosed | RenderError::Overloaded { .. } => {
                None
            }
        }
    }
}

/// Sanitize error messages for client-facing responses.
///
/// Hides internal details (stack-shaped strings, JS exception text) while keeping
/// the message classes the spec's concrete scenarios rely on.
pub fn sanitize_error(error: &RenderError) -> String {
    match error {
        RenderError::Core(e) => e.to_string(),
        RenderError::Fetch { url, .. } => format!("Failed to fetch package: {url}"),
        RenderError::Timeout(ms) => format!("Render timed out after {ms}ms"),
        RenderError::ChannelClosed => "Service temporarily unavailable".to_string(),
        RenderError::Overloaded { retry_after_secs } => {
            format!("Service busy, retry after {retry_after_secs}s")
        }
        RenderError::JsExecution(_) => "Render failed".to_string(),
        RenderError::NotRegistered => "Render failed: entry point did not register for SSR".to_string(),
        RenderError::CallbackRejected(_) => "Render failed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_is_input_error() {
        let err = RenderError::Core(RenderCoreError::NoJsUrls);
        assert!(err.is_input_error());
        assert!(err.log_tag().is_none());
    }

    #[test]
    fn test_fetch_error_tagged_fetch_fail() {
        let err = RenderError::Fetch {
            url: "https://example.com/a.js".to_string(),
            last_status: Some(404),
            cause: "not found".to_string(),
        };
        assert!(!err.is_input_error());
        assert_eq!(err.log_tag(), Some("FETCH FAIL"));
    }

    #[test]
    fn test_sandbox_errors_tagged_render_fail() {
        assert_eq!(
            RenderError::NotRegistered.log_tag(),
            Some("RENDER FAIL")
        );
        assert_eq!(
            RenderError::Timeout(30_000).log_tag(),
            Some("RENDER FAIL")
        );
    }

    #[test]
    fn test_sanitize_hides_js_exception_text() {
        let err = RenderError::JsExecution("TypeError: secretInternal.stack".to_string());
        assert_eq!(sanitize_error(&err), "Render failed");
    }
}
