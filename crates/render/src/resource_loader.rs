//! Sandbox outbound-fetch adapter (§4.3): images are blocked, scripts/data are
//! routed through the `PackageCache`, and in-flight loads are tracked so `close()`
//! can refuse new ones and let outstanding ones settle without stranding callers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use ssrender_core::RequestStats;

use crate::cache::PackageCache;
use crate::fetcher::FetchError;

/// Outcome of a resource load request issued from inside the sandbox.
pub enum LoadOutcome {
    /// Images are always rejected; not logged as an error (§4.3).
    Blocked,
    /// Successfully routed through the cache.
    Content(Arc<String>),
    /// The fetch failed after retries, or the loader is closed.
    Error(String),
}

/// Tracks in-flight resource loads for one render's sandbox and coordinates
/// close-time teardown so no callback can fire after the sandbox is gone.
pub struct ResourceLoader {
    cache: Arc<PackageCache>,
    closed: AtomicBool,
    in_flight: AtomicUsize,
    drained: Notify,
}

impl ResourceLoader {
    pub fn new(cache: Arc<PackageCache>) -> Self {
        Self {
            cache,
            closed: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
        }
    }

    /// An image was requested. Always blocked, never an error (§4.3).
    pub fn load_image(&self) -> LoadOutcome {
        LoadOutcome::Blocked
    }

    /// A script or data resource was requested at runtime (beyond the
    /// request's initial package list - e.g. a dynamic import or xhr-like
    /// call from bundle code). Routed through the single-flight cache.
    pub async fn load_resource(&self, url: &str, stats: &mut RequestStats) -> LoadOutcome {
        if self.closed.load(Ordering::SeqCst) {
            return LoadOutcome::Error("resource loader closed".to_string());
        }

        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = self.cache.get_or_fetch(url, stats).await;
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.drained.notify_waiters();
        }

        match result {
            Ok(package) => LoadOutcome::Content(package.content),
            Err(FetchError { cause, .. }) => LoadOutcome::Error(cause),
        }
    }

    /// Refuse new loads and wait for outstanding ones to settle. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        while self.in_flight.load(Ordering::SeqCst) > 0 {
            self.drained.notified().await;
        }
    }
}
