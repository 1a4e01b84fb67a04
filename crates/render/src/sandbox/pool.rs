//! Fixed-size pool of sandbox workers (§9), grounded on the teacher's `SsrPool`.
//!
//! Dispatch is round-robin over a fixed set of dedicated worker threads.
//! Backpressure is enforced by checking the target worker's channel capacity
//! before sending rather than letting callers queue indefinitely: a full
//! channel means the pool is overloaded and the caller should see
//! `RenderError::Overloaded` instead of waiting behind an unbounded backlog.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};

use ssrender_core::RequestStats;

use crate::error::{RenderError, Result};
use crate::resource_loader::ResourceLoader;
use crate::sandbox::runtime::{ExecPackage, HarvestOutcome};
use crate::sandbox::worker::{RenderJob, SandboxWorker};

/// A pool of dedicated sandbox worker threads, dispatched round-robin.
pub struct SandboxPool {
    workers: Vec<SandboxWorker>,
    next: AtomicUsize,
    render_timeout: Duration,
}

impl SandboxPool {
    /// Spawn `worker_count` dedicated worker threads, each with up to
    /// `max_pending` queued jobs before it is considered full.
    pub fn new(
        worker_count: usize,
        max_pending: usize,
        render_timeout: Duration,
        fetch_client: reqwest::Client,
    ) -> Self {
        let worker_count = worker_count.max(1);
        let workers = (0..worker_count)
            .map(|_| SandboxWorker::spawn(max_pending, fetch_client.clone()))
            .collect();

        Self {
            workers,
            next: AtomicUsize::new(0),
            render_timeout,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Submit a render job to the next available worker, round-robin.
    ///
    /// Returns `RenderError::Overloaded` if every worker's queue is full, and
    /// `RenderError::Timeout` if the job does not complete within
    /// `render_timeout` (the worker keeps running the job regardless; the
    /// caller just stops waiting).
    pub async fn execute(
        &self,
        bootstrap_script: String,
        packages: Vec<ExecPackage>,
        props_json: String,
        resource_loader: Arc<ResourceLoader>,
        stats: Arc<Mutex<RequestStats>>,
    ) -> Result<(HarvestOutcome, u64)> {
        let worker = self.pick_worker()?;

        let (response_tx, response_rx) = oneshot::channel();
        let job = RenderJob {
            bootstrap_script,
            packages,
            props_json,
            resource_loader,
            stats,
            response_tx,
        };

        worker
            .sender()
            .send(job)
            .await
            .map_err(|_| RenderError::ChannelClosed)?;

        match tokio::time::timeout(self.render_timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(RenderError::ChannelClosed),
            Err(_) => Err(RenderError::Timeout(self.render_timeout.as_millis() as u64)),
        }
    }

    fn pick_worker(&self) -> Result<&SandboxWorker> {
        let len = self.workers.len();
        for _ in 0..len {
            let idx = self.next.fetch_add(1, Ordering::Relaxed) % len;
            let candidate = &self.workers[idx];
            if candidate.has_capacity() {
                return Ok(candidate);
            }
        }
        Err(RenderError::Overloaded {
            retry_after_secs: 1,
        })
    }
}
