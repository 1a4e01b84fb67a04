//! `POST /flush` (§5 "Flush"): drops every cached package, forcing the next
//! render of each URL to refetch. Secret-checked the same as `/render`.

use axum::extract::State;
use axum::http::StatusCode;

use crate::state::AppState;

pub async fn flush(State(state): State<AppState>) -> (StatusCode, String) {
    state.cache.flush_all().await;
    tracing::info!("package cache flushed");
    (StatusCode::OK, format!("{}\n", state.instance_id))
}
