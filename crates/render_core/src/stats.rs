//! Per-request statistics (§4.6). Owned by one render request; discarded after response.

use serde::Serialize;

/// Per-render-request counters, threaded through the fetcher and context factory and
/// emitted as a single structured log line when the response completes.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RequestStats {
    #[serde(rename = "pendingRenderRequests")]
    pub pending_render_requests: u64,
    #[serde(rename = "packageFetches")]
    pub package_fetches: u64,
    #[serde(rename = "fromCache")]
    pub from_cache: u64,
    #[serde(rename = "vmContextSize")]
    pub vm_context_size: u64,
    #[serde(rename = "createdVmContext")]
    pub created_vm_context: bool,
}

impl RequestStats {
    /// Start a new stats record, capturing the process-global pending-request count.
    pub fn new(pending_render_requests: u64) -> Self {
        Self {
            pending_render_requests,
            ..Default::default()
        }
    }

    /// Record that this caller performed a real network fetch for a package (as
    /// opposed to a cache hit or a shared FETCHING outcome).
    pub fn record_fetch(&mut self) {
        self.package_fetches += 1;
    }

    /// Record that this caller was served from a READY cache entry.
    pub fn record_cache_hit(&mut self) {
        self.from_cache += 1;
    }

    /// Record that a sandbox was built and its approximate content size.
    ///
    /// `vm_context_size` is `sum(content.len()) * 2` - a crude proxy preserved for
    /// log-line compatibility, not a real memory measurement.
    pub fn record_vm_context(&mut self, vm_context_size: u64) {
        self.created_vm_context = true;
        self.vm_context_size = vm_context_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_captures_pending_count() {
        let stats = RequestStats::new(7);
        assert_eq!(stats.pending_render_requests, 7);
        assert_eq!(stats.package_fetches, 0);
    }

    #[test]
    fn test_record_fetch_and_cache_hit() {
        let mut stats = RequestStats::new(0);
        stats.record_fetch();
        stats.record_fetch();
        stats.record_cache_hit();
        assert_eq!(stats.package_fetches, 2);
        assert_eq!(stats.from_cache, 1);
    }

    #[test]
    fn test_record_vm_context() {
        let mut stats = RequestStats::new(0);
        stats.record_vm_context(42);
        assert!(stats.created_vm_context);
        assert_eq!(stats.vm_context_size, 42);
    }
}
