use std::time::Duration;

use axum::{
    http::{header, Method, StatusCode},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{handlers, middleware::require_secret, state::AppState};

/// Request bodies above this size are rejected before JSON parsing (§6).
const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// Build the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let render_routes = Router::new()
        .route("/render", post(handlers::render))
        .route("/flush", post(handlers::flush))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_secret,
        ))
        .layer(cors);

    let meta_routes = Router::new()
        .route("/_api/ping", get(handlers::ping))
        .route("/_api/version", get(handlers::version))
        .route("/_ah/health", get(handlers::health))
        .route("/_ah/start", get(handlers::start))
        .route("/_ah/stop", get(handlers::stop));

    Router::new()
        .merge(render_routes)
        .merge(meta_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(35),
        ))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .with_state(state)
}
