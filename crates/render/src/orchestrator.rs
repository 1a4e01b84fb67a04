//! Render Orchestrator (§4.5): couples fetch -> context -> execute -> harvest,
//! and owns the `RECEIVED -> VALIDATED -> FETCHING -> CONTEXT_READY ->
//! AWAITING_RENDER -> RESPONDED` state machine for one `/render` request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use ssrender_core::{
    generate_bootstrap, validate_render_body, ApolloBootstrapConfig, RenderBody, RenderCoreConfig,
    RenderCss, RenderResult, RequestStats,
};

use crate::cache::PackageCache;
use crate::context::RenderContext;
use crate::error::{RenderError, Result};
use crate::sandbox::{ExecPackage, HarvestOutcome, SandboxPool};

/// Couples the package cache and sandbox pool into one `/render` call.
///
/// Owns the process-global `pendingRenderRequests` counter (§4.6): incremented
/// on entry, decremented on every exit path, success or failure.
pub struct RenderOrchestrator {
    cache: Arc<PackageCache>,
    pool: Arc<SandboxPool>,
    config: Arc<RenderCoreConfig>,
    pending_render_requests: Arc<AtomicU64>,
}

/// One completed render, with the stats line the caller should log.
pub struct RenderOutcome {
    pub result: RenderResult,
    pub stats: RequestStats,
    pub entry_url: String,
}

impl RenderOrchestrator {
    pub fn new(cache: Arc<PackageCache>, pool: Arc<SandboxPool>, config: Arc<RenderCoreConfig>) -> Self {
        Self {
            cache,
            pool,
            config,
            pending_render_requests: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Run one `/render` request to completion. Input validation failures are
    /// `RenderError::Core`, mapped by the HTTP edge to 400; everything else
    /// downstream of validation is a 500.
    pub async fn render(&self, body: RenderBody) -> Result<RenderOutcome> {
        let js_urls = validate_render_body(&body)?;
        let entry_url = js_urls
            .last()
            .cloned()
            .expect("validate_render_body guarantees at least one JS url");

        self.pending_render_requests.fetch_add(1, Ordering::SeqCst);
        let outcome = self.render_validated(body, js_urls).await;
        self.pending_render_requests.fetch_sub(1, Ordering::SeqCst);

        if let Ok((_, stats)) = &outcome {
            let line = serde_json::to_string(stats).unwrap_or_default();
            tracing::info!("render-stats for {entry_url}: {line}");
        }

        outcome.map(|(result, stats)| RenderOutcome {
            result,
            stats,
            entry_url,
        })
    }

    async fn render_validated(
        &self,
        body: RenderBody,
        js_urls: Vec<String>,
    ) -> Result<(RenderResult, RequestStats)> {
        let pending = self.pending_render_requests.load(Ordering::SeqCst);
        let mut stats = RequestStats::new(pending);

        let location = location_of(&body);

        // VALIDATED -> FETCHING.
        self.cache.flush_unused().await;
        let packages = self.fetch_all(&js_urls, &mut stats).await.map_err(|e| {
            tracing::error!("FETCH FAIL ({location}): {e}");
            e
        })?;

        // FETCHING -> CONTEXT_READY.
        let bootstrap_script = self.build_bootstrap(&body, &location)?;

        let ctx = RenderContext::new(self.cache.clone());
        ctx.mark_loaded().await?;

        // CONTEXT_READY -> AWAITING_RENDER -> RESPONDED.
        let props_json = serde_json::to_string(&body.props)
            .map_err(|e| RenderError::JsExecution(e.to_string()))?;
        let stats_handle = Arc::new(Mutex::new(stats));

        let render_result = ctx
            .render(
                &self.pool,
                bootstrap_script,
                packages,
                props_json,
                stats_handle.clone(),
            )
            .await;

        // §4.4 close contract: every exit path closes the context exactly once.
        ctx.close().await;

        let stats = stats_handle.lock().await.clone();

        match render_result {
            Ok((HarvestOutcome::Ok { html, css_json }, vm_context_size)) => {
                let mut stats = stats;
                stats.record_vm_context(vm_context_size);
                let css = parse_css(&css_json);
                Ok((RenderResult { html, css }, stats))
            }
            Ok((HarvestOutcome::NotRegistered, _)) => {
                tracing::error!("RENDER FAIL ({location}): entry point did not register for SSR");
                Err(RenderError::NotRegistered)
            }
            Ok((HarvestOutcome::CallbackRejected(msg), _)) => {
                tracing::error!("RENDER FAIL ({location}): {msg}");
                Err(RenderError::CallbackRejected(msg))
            }
            Err(e) => {
                tracing::error!("RENDER FAIL ({location}): {e}");
                Err(e)
            }
        }
    }

    async fn fetch_all(
        &self,
        js_urls: &[String],
        stats: &mut RequestStats,
    ) -> Result<Vec<ExecPackage>> {
        let fetches = futures_util::future::join_all(js_urls.iter().cloned().map(|url| {
            let cache = self.cache.clone();
            async move {
                let mut local_stats = RequestStats::new(0);
                let result = cache.get_or_fetch(&url, &mut local_stats).await;
                (url, result, local_stats)
            }
        }))
        .await;

        let mut packages = Vec::with_capacity(fetches.len());
        for (url, result, local_stats) in fetches {
            stats.package_fetches += local_stats.package_fetches;
            stats.from_cache += local_stats.from_cache;
            match result {
                Ok(package) => packages.push(ExecPackage {
                    url: package.url,
                    content: package.content,
                }),
                Err(e) => {
                    return Err(RenderError::Fetch {
                        url,
                        last_status: e.last_status,
                        cause: e.cause,
                    })
                }
            }
        }
        Ok(packages)
    }

    fn build_bootstrap(&self, body: &RenderBody, location: &str) -> Result<String> {
        let mut globals = body.globals.clone();
        globals.remove("location");
        let globals_value: serde_json::Value =
            serde_json::Value::Object(globals.into_iter().collect());

        let apollo = body.apollo_network.as_ref().map(|cfg| ApolloBootstrapConfig {
            url: cfg.url.clone(),
            headers: cfg.headers.clone(),
            timeout_ms: cfg.timeout.unwrap_or(self.config.apollo_timeout_ms),
        });

        Ok(generate_bootstrap(location, &globals_value, apollo.as_ref())?)
    }
}

fn location_of(body: &RenderBody) -> String {
    body.globals
        .get("location")
        .and_then(|v| v.as_str())
        .unwrap_or("about:blank")
        .to_string()
}

/// Parse the harvested `{content, classNames}` payload into the public `RenderCss`
/// union (§3): non-empty `classNames` means the bundle's CSS library reported
/// structured output; otherwise it's a plain string or absent entirely.
fn parse_css(css_json: &str) -> RenderCss {
    let value: serde_json::Value =
        serde_json::from_str(css_json).unwrap_or(serde_json::Value::Null);
    let content = value.get("content").and_then(|v| v.as_str());
    let class_names: Vec<String> = value
        .get("classNames")
        .and_then(|v| v.as_array())
        .map(|a| a.iter().filter_map(|x| x.as_str().map(String::from)).collect())
        .unwrap_or_default();

    match content {
        Some(c) if !class_names.is_empty() => RenderCss::Structured {
            content: c.to_string(),
            rendered_class_names: class_names,
        },
        Some(c) => RenderCss::Plain(c.to_string()),
        None => RenderCss::None,
    }
}
