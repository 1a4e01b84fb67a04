//! Render Context Factory (§4.4): the scoped, once-per-request resource that
//! owns a sandbox's outbound resource loading and enforces the
//! NEW -> LOADED -> RENDERING -> CLOSED lifecycle.
//!
//! The sandbox itself (the `deno_core::JsRuntime`) is built, run, and dropped
//! entirely inside `sandbox::runtime::execute_render` on its worker thread -
//! there is no long-lived `JsRuntime` handle here to hold onto, since it is
//! `!Send` and this type is shared across the async orchestrator. What this
//! type owns instead is everything a request needs *around* that one-shot
//! execution: the per-request `ResourceLoader` and the NEW/LOADED/RENDERING/
//! CLOSED state, so `close()` has a single, idempotent place to live and the
//! orchestrator cannot accidentally use a context twice.

use std::sync::Arc;

use tokio::sync::Mutex;

use ssrender_core::RequestStats;

use crate::cache::PackageCache;
use crate::error::{RenderError, Result};
use crate::resource_loader::ResourceLoader;
use crate::sandbox::{ExecPackage, HarvestOutcome, SandboxPool};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextState {
    New,
    Loaded,
    Rendering,
    Closed,
}

/// A scoped render context: one `ResourceLoader` plus lifecycle state, for one request.
pub struct RenderContext {
    state: Mutex<ContextState>,
    resource_loader: Arc<ResourceLoader>,
}

impl RenderContext {
    pub fn new(cache: Arc<PackageCache>) -> Self {
        Self {
            state: Mutex::new(ContextState::New),
            resource_loader: Arc::new(ResourceLoader::new(cache)),
        }
    }

    pub fn resource_loader(&self) -> Arc<ResourceLoader> {
        self.resource_loader.clone()
    }

    /// NEW -> LOADED: the request's packages have been fetched and are ready
    /// to execute. No sandbox work has happened yet.
    pub async fn mark_loaded(&self) -> Result<()> {
        self.transition(ContextState::New, ContextState::Loaded).await
    }

    /// LOADED -> RENDERING -> (implicit) RESPONDED: build the sandbox, run the
    /// request's packages, and await the registered render callback, on the
    /// given worker pool. The context does not transition back out of
    /// RENDERING itself - the caller closes it on every exit path (§4.4 close
    /// contract), which is what actually finalizes the lifecycle.
    pub async fn render(
        &self,
        pool: &SandboxPool,
        bootstrap_script: String,
        packages: Vec<ExecPackage>,
        props_json: String,
        stats: Arc<Mutex<RequestStats>>,
    ) -> Result<(HarvestOutcome, u64)> {
        self.transition(ContextState::Loaded, ContextState::Rendering)
            .await?;

        pool.execute(
            bootstrap_script,
            packages,
            props_json,
            self.resource_loader.clone(),
            stats,
        )
        .await
    }

    /// Close the context: refuse new resource loads, wait for outstanding ones
    /// to settle, and mark CLOSED. Idempotent - safe to call from every exit
    /// path (success, error, timeout, cancellation) without double-closing.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock().await;
            if *state == ContextState::Closed {
                return;
            }
            *state = ContextState::Closed;
        }
        self.resource_loader.close().await;
    }

    async fn transition(&self, from: ContextState, to: ContextState) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state != from {
            return Err(RenderError::JsExecution(format!(
                "invalid render context transition: {:?} -> {:?} (currently {:?})",
                from, to, *state
            )));
        }
        *state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::PackageFetcher;
    use std::time::Duration;

    fn context() -> RenderContext {
        let fetcher = Arc::new(PackageFetcher::new(1, Duration::from_secs(1)));
        RenderContext::new(Arc::new(PackageCache::new(fetcher)))
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let ctx = context();
        ctx.close().await;
        ctx.close().await;
    }

    #[tokio::test]
    async fn test_mark_loaded_then_render_requires_order() {
        let ctx = context();
        assert!(ctx.mark_loaded().await.is_ok());
        assert!(ctx.mark_loaded().await.is_err());
    }

    #[tokio::test]
    async fn test_render_without_load_is_rejected() {
        let ctx = context();
        let pool = SandboxPool::new(1, 10, Duration::from_secs(5), reqwest::Client::new());
        let result = ctx
            .render(
                &pool,
                String::new(),
                vec![],
                "{}".to_string(),
                Arc::new(Mutex::new(RequestStats::new(0))),
            )
            .await;
        assert!(result.is_err());
    }
}
