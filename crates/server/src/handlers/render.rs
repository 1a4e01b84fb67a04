//! `POST /render` (§5 "Render").

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use ssrender::RenderError;
use ssrender_core::{ErrorBody, RenderBody};

use crate::state::AppState;

pub async fn render(State(state): State<AppState>, Json(body): Json<RenderBody>) -> Response {
    match state.orchestrator.render(body).await {
        Ok(outcome) => {
            tracing::info!(
                entry_url = %outcome.entry_url,
                package_fetches = outcome.stats.package_fetches,
                from_cache = outcome.stats.from_cache,
                vm_context_size = outcome.stats.vm_context_size,
                "render ok"
            );
            (StatusCode::OK, Json(outcome.result)).into_response()
        }
        Err(err) => render_error_response(err),
    }
}

fn render_error_response(err: RenderError) -> Response {
    if let Some(tag) = err.log_tag() {
        tracing::error!(error = %err, "{tag}");
    }

    let message = ssrender::sanitize_error(&err);
    let body = Json(ErrorBody::simple(message));

    if err.is_input_error() {
        return (StatusCode::BAD_REQUEST, body).into_response();
    }

    match err {
        RenderError::Overloaded { retry_after_secs } => {
            let mut response = (StatusCode::SERVICE_UNAVAILABLE, body).into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            response
        }
        RenderError::ChannelClosed => (StatusCode::SERVICE_UNAVAILABLE, body).into_response(),
        // §4.5/§7: the overall render timeout is a render failure, not a gateway
        // concern - the `/render` contract only ever responds 400 or 500.
        _ => (StatusCode::INTERNAL_SERVER_ERROR, body).into_response(),
    }
}
