//! Unauthenticated meta endpoints: liveness/readiness probes and the GAE
//! instance lifecycle hooks (§6). Plain text, no CORS, no secret check.

pub async fn ping() -> &'static str {
    "pong!\n"
}

pub async fn version() -> String {
    format!("{}\n", std::env::var("GAE_VERSION").unwrap_or_else(|_| "dev".to_string()))
}

pub async fn health() -> &'static str {
    "ok!\n"
}

pub async fn start() -> &'static str {
    "ok!\n"
}

pub async fn stop() -> &'static str {
    "ok!\n"
}
