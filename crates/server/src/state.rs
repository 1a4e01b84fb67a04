//! Shared process state, handed to every handler via `axum::extract::State`.
//!
//! Grounded on the teacher's `AppState` (Arc-wrapped shared resources behind
//! a `Clone`-able handle) but without the calendar app's repository/cache/SSE
//! machinery: this service only ever needs the render pipeline plus the
//! secret store.

use std::sync::Arc;
use std::time::Duration;

use ssrender::{PackageCache, PackageFetcher, RenderOrchestrator, SandboxPool};

use crate::config::ServerConfig;
use crate::middleware::SecretStore;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RenderOrchestrator>,
    pub cache: Arc<PackageCache>,
    pub secret_store: Arc<SecretStore>,
    pub dev_mode: bool,
    pub instance_id: Arc<String>,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        let fetcher = Arc::new(PackageFetcher::new(
            config.core.fetch_attempts,
            Duration::from_millis(config.core.fetch_timeout_ms),
        ));
        let cache = Arc::new(PackageCache::new(fetcher));

        let fetch_client = reqwest::Client::new();
        let pool = Arc::new(SandboxPool::new(
            config.core.worker_count,
            config.core.max_pending,
            Duration::from_millis(config.core.render_timeout_ms),
            fetch_client,
        ));

        let orchestrator = Arc::new(RenderOrchestrator::new(
            cache.clone(),
            pool,
            Arc::new(config.core.clone()),
        ));

        let secret_store = Arc::new(SecretStore::new(
            config.secret_file.clone(),
            config.dev_mode,
        ));

        let instance_id = std::env::var("GAE_INSTANCE").unwrap_or_else(|_| "dev".to_string());

        Self {
            orchestrator,
            cache,
            secret_store,
            dev_mode: config.dev_mode,
            instance_id: Arc::new(instance_id),
        }
    }
}
