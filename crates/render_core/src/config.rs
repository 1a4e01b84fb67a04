//! Validated configuration for the render pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{RenderCoreError, Result};

/// Tunable knobs for the render pipeline (validated, immutable once built).
///
/// This is the pure, process-agnostic half of configuration: it knows nothing about
/// environment variables or CLI flags (see `ServerConfig` in the `ssrender_server` crate
/// for that), only that its values are internally consistent.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderCoreConfig {
    /// Number of dedicated sandbox worker threads.
    pub worker_count: usize,
    /// Maximum render jobs queued per worker before it reports no capacity.
    pub max_pending: usize,
    /// Total attempts (including the first) per package fetch.
    pub fetch_attempts: u32,
    /// Per-attempt fetch timeout, in milliseconds.
    pub fetch_timeout_ms: u64,
    /// Apollo-like network shim request timeout, in milliseconds.
    pub apollo_timeout_ms: u64,
    /// Overall render-callback-await timeout, in milliseconds.
    pub render_timeout_ms: u64,
    /// Package cache capacity (number of distinct URLs retained).
    pub cache_max_entries: usize,
}

impl RenderCoreConfig {
    /// Create and validate pipeline config.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        worker_count: usize,
        max_pending: usize,
        fetch_attempts: u32,
        fetch_timeout_ms: u64,
        apollo_timeout_ms: u64,
        render_timeout_ms: u64,
        cache_max_entries: usize,
    ) -> Result<Self> {
        if worker_count == 0 {
            return Err(RenderCoreError::InvalidWorkerCount);
        }
        if render_timeout_ms == 0 {
            return Err(RenderCoreError::InvalidTimeout);
        }
        if fetch_attempts == 0 {
            return Err(RenderCoreError::InvalidFetchAttempts);
        }

        Ok(Self {
            worker_count,
            max_pending,
            fetch_attempts,
            fetch_timeout_ms,
            apollo_timeout_ms,
            render_timeout_ms,
            cache_max_entries,
        })
    }

    /// Defaults matching `SPEC_FULL.md`: 4 workers, 100 pending per worker, 3 fetch
    /// attempts at 60s each, 1000ms Apollo timeout, 30s render timeout, 10k cache entries.
    pub fn with_defaults(worker_count: usize) -> Result<Self> {
        Self::new(worker_count, 100, 3, 60_000, 1_000, 30_000, 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_defaults() {
        let config = RenderCoreConfig::with_defaults(4).unwrap();
        assert_eq!(config.worker_count, 4);
        assert_eq!(config.fetch_attempts, 3);
        assert_eq!(config.fetch_timeout_ms, 60_000);
        assert_eq!(config.apollo_timeout_ms, 1_000);
        assert_eq!(config.render_timeout_ms, 30_000);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = RenderCoreConfig::new(0, 100, 3, 60_000, 1_000, 30_000, 10_000);
        assert!(matches!(result, Err(RenderCoreError::InvalidWorkerCount)));
    }

    #[test]
    fn test_zero_render_timeout_rejected() {
        let result = RenderCoreConfig::new(4, 100, 3, 60_000, 1_000, 0, 10_000);
        assert!(matches!(result, Err(RenderCoreError::InvalidTimeout)));
    }

    #[test]
    fn test_zero_fetch_attempts_rejected() {
        let result = RenderCoreConfig::new(4, 100, 0, 60_000, 1_000, 30_000, 10_000);
        assert!(matches!(
            result,
            Err(RenderCoreError::InvalidFetchAttempts)
        ));
    }
}
