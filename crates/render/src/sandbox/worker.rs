//! Sandbox worker thread management (§9 "Worker-pool execution model").
//!
//! Each worker runs in a dedicated OS thread with its own single-threaded Tokio
//! runtime, because `deno_core::JsRuntime` is `!Send`. Unlike the teacher's
//! `SsrWorker` (which preloads one fixed bundle per worker at spawn time), this
//! worker is a generic JS executor: each job supplies its own already-fetched,
//! already-ordered package list, since the URL set varies per request.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Mutex};

use ssrender_core::RequestStats;

use crate::error::Result;
use crate::resource_loader::ResourceLoader;
use crate::sandbox::runtime::{self, ExecPackage, HarvestOutcome};

/// One render job handed to a worker thread.
pub struct RenderJob {
    pub bootstrap_script: String,
    pub packages: Vec<ExecPackage>,
    pub props_json: String,
    pub resource_loader: Arc<ResourceLoader>,
    pub stats: Arc<Mutex<RequestStats>>,
    pub response_tx: oneshot::Sender<Result<(HarvestOutcome, u64)>>,
}

/// A dedicated sandbox worker thread.
pub struct SandboxWorker {
    job_tx: mpsc::Sender<RenderJob>,
}

impl SandboxWorker {
    /// Spawn a new worker thread. I/O: spawns an OS thread with its own runtime.
    pub fn spawn(max_pending: usize, fetch_client: reqwest::Client) -> Self {
        let (job_tx, mut job_rx) = mpsc::channel::<RenderJob>(max_pending);

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("failed to create Tokio runtime for sandbox worker");

            // JsRuntime and its ops are !Send; a LocalSet lets the async ops
            // drive their own futures on this thread without Send bounds.
            let local = tokio::task::LocalSet::new();
            local.block_on(&rt, async move {
                tracing::debug!("sandbox worker started");

                while let Some(job) = job_rx.recv().await {
                    let result = runtime::execute_render(
                        job.bootstrap_script,
                        &job.packages,
                        job.props_json,
                        job.resource_loader,
                        job.stats,
                        fetch_client.clone(),
                    )
                    .await;
                    let _ = job.response_tx.send(result);
                }

                tracing::debug!("sandbox worker shutting down");
            });
        });

        Self { job_tx }
    }

    /// True if this worker's queue has room for another job without blocking.
    pub fn has_capacity(&self) -> bool {
        self.job_tx.capacity() > 0
    }

    pub fn sender(&self) -> mpsc::Sender<RenderJob> {
        self.job_tx.clone()
    }
}
