//! JsRuntime execution for one render (§4.4, §9 "Sandbox boundary").
//!
//! This module contains the impure side-effect code that executes JavaScript using
//! `deno_core`'s `JsRuntime`. It generalizes the teacher's single `op_set_html` +
//! thread-local harvest cell into the full SSR handshake: a console bridge, a
//! dangling-timer reporter, a harvest cell that distinguishes success/error/
//! not-registered outcomes, and two async ops bridging the sandbox's outbound
//! network requests (the resource loader and the Apollo-like shim) back out to
//! `reqwest` on the worker's own single-threaded Tokio runtime.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use deno_core::{anyhow, extension, op2, JsRuntime, OpState, RuntimeOptions};
use tokio::sync::Mutex;

use ssrender_core::RequestStats;

use crate::error::{RenderError, Result};
use crate::resource_loader::{LoadOutcome, ResourceLoader};

/// What the sandbox produced, harvested from the registered render callback.
#[derive(Debug, Clone)]
pub enum HarvestOutcome {
    Ok { html: String, css_json: String },
    CallbackRejected(String),
    NotRegistered,
}

thread_local! {
    static HARVEST: RefCell<Option<HarvestOutcome>> = const { RefCell::new(None) };
    static DANGLING_TIMER_WARNED: RefCell<bool> = const { RefCell::new(false) };
}

/// Bag of per-render dependencies the ops need, stashed in `OpState`.
///
/// `Arc`/`tokio::sync::Mutex` rather than `Rc`/`RefCell`: the job carrying this
/// data crosses the `mpsc` channel from the (multi-threaded) orchestrator to this
/// worker's dedicated OS thread, so it must be `Send` even though only one thread
/// ever touches it once it arrives.
struct SandboxDeps {
    resource_loader: Arc<ResourceLoader>,
    stats: Arc<Mutex<RequestStats>>,
    http: reqwest::Client,
}

#[op2(fast)]
fn op_console_log(#[string] level: String, #[string] message: String) {
    match level.as_str() {
        "warn" => tracing::warn!(target: "ssrender::sandbox_console", "{message}"),
        "error" => tracing::error!(target: "ssrender::sandbox_console", "{message}"),
        _ => tracing::info!(target: "ssrender::sandbox_console", "{message}"),
    }
}

#[op2(fast)]
fn op_dangling_timer() {
    DANGLING_TIMER_WARNED.with(|warned| {
        if !*warned.borrow() {
            *warned.borrow_mut() = true;
            tracing::warn!("Dangling timer(s) encountered");
        }
    });
}

#[op2(fast)]
fn op_harvest_result(#[string] html: String, #[string] css_json: String) {
    HARVEST.with(|cell| {
        *cell.borrow_mut() = Some(HarvestOutcome::Ok { html, css_json });
    });
}

#[op2(fast)]
fn op_harvest_error(#[string] message: String) {
    HARVEST.with(|cell| {
        *cell.borrow_mut() = Some(HarvestOutcome::CallbackRejected(message));
    });
}

#[op2(fast)]
fn op_not_registered() {
    HARVEST.with(|cell| {
        *cell.borrow_mut() = Some(HarvestOutcome::NotRegistered);
    });
}

/// Runtime-requested resource load (xhr-like/dynamic script), routed through the
/// request's `ResourceLoader` (and, transitively, the single-flight cache).
#[op2(async)]
#[string]
async fn op_resource_fetch(
    state: Rc<RefCell<OpState>>,
    #[string] url: String,
) -> Result<String, anyhow::Error> {
    let (loader, stats) = {
        let state = state.borrow();
        let deps = state.borrow::<SandboxDeps>();
        (deps.resource_loader.clone(), deps.stats.clone())
    };

    let outcome = {
        let mut stats = stats.lock().await;
        loader.load_resource(&url, &mut stats).await
    };

    match outcome {
        LoadOutcome::Content(content) => Ok((*content).clone()),
        LoadOutcome::Blocked => Err(anyhow::anyhow!("blocked")),
        LoadOutcome::Error(e) => Err(anyhow::anyhow!(e)),
    }
}

/// Apollo-like GraphQL link fetch (§4.7): races the request against a timeout,
/// carries caller-supplied headers, rejects on non-200.
#[op2(async)]
#[string]
async fn op_apollo_fetch(
    state: Rc<RefCell<OpState>>,
    #[string] url: String,
    #[string] headers_json: String,
    #[string] body_json: String,
    timeout_ms: u32,
) -> Result<String, anyhow::Error> {
    let client = state.borrow().borrow::<SandboxDeps>().http.clone();
    let headers: std::collections::HashMap<String, String> = serde_json::from_str(&headers_json)?;

    let mut request = client.post(&url).body(body_json);
    for (key, value) in headers {
        request = request.header(key, value);
    }

    let response = tokio::time::timeout(
        Duration::from_millis(timeout_ms as u64),
        request.send(),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Apollo request to {url} timed out after {timeout_ms}ms"))??;

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Ok(serde_json::json!({ "status": status, "body": body }).to_string())
}

extension!(
    ssrender_ext,
    ops = [
        op_console_log,
        op_dangling_timer,
        op_harvest_result,
        op_harvest_error,
        op_not_registered,
        op_resource_fetch,
        op_apollo_fetch,
    ],
);

/// One fetched package ready for execution, attributed to its source URL.
pub struct ExecPackage {
    pub url: String,
    pub content: Arc<String>,
}

/// Execute one render inside a fresh `JsRuntime`.
///
/// **MUST be called from a dedicated thread** (`JsRuntime` is `!Send`) backed by a
/// single-threaded Tokio runtime, so the async ops above can simply `.await`.
///
/// Returns the harvested `(html, css_json)` pair, the approximate `vmContextSize`
/// (`sum(content.len()) * 2`, §9 - preserved for log-line compatibility, not a real
/// memory measurement), or a `RenderError` for any failure along the way.
pub async fn execute_render(
    bootstrap_script: String,
    packages: &[ExecPackage],
    props_json: String,
    resource_loader: Arc<ResourceLoader>,
    stats: Arc<Mutex<RequestStats>>,
    fetch_client: reqwest::Client,
) -> Result<(HarvestOutcome, u64)> {
    HARVEST.with(|cell| *cell.borrow_mut() = None);
    DANGLING_TIMER_WARNED.with(|warned| *warned.borrow_mut() = false);

    let mut runtime = JsRuntime::new(RuntimeOptions {
        extensions: vec![ssrender_ext::init()],
        ..Default::default()
    });

    runtime.op_state().borrow_mut().put(SandboxDeps {
        resource_loader,
        stats,
        http: fetch_client,
    });

    runtime
        .execute_script("<bootstrap>", bootstrap_script)
        .map_err(|e| RenderError::JsExecution(e.to_string()))?;

    let mut vm_context_size: u64 = 0;
    for package in packages {
        vm_context_size += (package.content.len() * 2) as u64;
        // `Box::leak`-free static name: deno_core wants a 'static str for the script
        // name, so each package is attributed by value, not by borrowing the URL.
        let script_name: &'static str = Box::leak(package.url.clone().into_boxed_str());
        runtime
            .execute_script(script_name, (*package.content).clone())
            .map_err(|e| RenderError::JsExecution(format!("{} threw: {e}", package.url)))?;
    }

    runtime
        .run_event_loop(Default::default())
        .await
        .map_err(|e| RenderError::JsExecution(e.to_string()))?;

    let invoke_script = format!(
        r#"
(async () => {{
    const cb = globalThis.__rrs && globalThis.__rrs.getRenderPromiseCallback;
    if (!cb) {{
        Deno.core.ops.op_not_registered();
        return;
    }}
    try {{
        const result = await cb(JSON.parse({props}), (globalThis.__rrs && globalThis.__rrs.apolloClient) || null);
        const html = result && result.html != null ? String(result.html) : "";
        let css = {{ content: null, classNames: [] }};
        if (result && result.css != null) {{
            if (typeof result.css === "string") {{
                css.content = result.css;
            }} else {{
                css.content = result.css.content != null ? String(result.css.content) : null;
                css.classNames = result.css.renderedClassNames || [];
            }}
        }}
        Deno.core.ops.op_harvest_result(html, JSON.stringify(css));
    }} catch (e) {{
        Deno.core.ops.op_harvest_error(e && e.stack ? String(e.stack) : String(e));
    }}
}})();
"#,
        props = serde_json::to_string(&props_json)
            .map_err(|e| RenderError::JsExecution(e.to_string()))?,
    );

    runtime
        .execute_script("<invoke>", invoke_script)
        .map_err(|e| RenderError::JsExecution(e.to_string()))?;

    runtime
        .run_event_loop(Default::default())
        .await
        .map_err(|e| RenderError::JsExecution(e.to_string()))?;

    let harvested = HARVEST.with(|cell| cell.borrow_mut().take());
    match harvested {
        Some(outcome) => Ok((outcome, vm_context_size)),
        None => Err(RenderError::JsExecution(
            "sandbox produced no harvest outcome".to_string(),
        )),
    }
}
