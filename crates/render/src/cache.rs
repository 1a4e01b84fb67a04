//! Package cache with single-flight fetch coalescing and request-scoped eviction (§4.1).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OnceCell};

use ssrender_core::RequestStats;

use crate::fetcher::{FetchError, PackageFetcher};

/// One fetched JavaScript package. Identity is the URL; immutable once fetched.
#[derive(Clone, Debug)]
pub struct Package {
    pub url: String,
    pub content: Arc<String>,
    pub fetched_at: Instant,
    pub size_bytes: usize,
}

/// A cache slot. The `OnceCell` *is* the CacheEntry state machine from §3: uninitialized
/// == FETCHING (or never attempted), `Ok` == READY, and a failed init leaves the cell
/// uninitialized again rather than caching a FAILED value - per §4.1, "FAILED entries
/// are not retained beyond the waking of their current waiters".
///
/// `last_used` is a plain `std::sync::Mutex`, not a `tokio` one: every critical section
/// on it is a single timestamp read/write with no `.await` inside, and `flush_unused`
/// needs to read it synchronously from within a `HashMap::retain` closure.
struct Entry {
    once: OnceCell<Package>,
    last_used: std::sync::Mutex<Instant>,
}

impl Entry {
    fn new() -> Self {
        Self {
            once: OnceCell::new(),
            last_used: std::sync::Mutex::new(Instant::now()),
        }
    }
}

pub struct PackageCache {
    fetcher: Arc<PackageFetcher>,
    entries: Mutex<HashMap<String, Arc<Entry>>>,
    /// When the previous call to `flush_unused` ran. `None` before the first call.
    /// The eviction cutoff for a call is the *previous* call's timestamp, so entries
    /// touched anywhere during the render that just finished - which all land after
    /// that previous timestamp - survive into the next one.
    previous_batch_start: Mutex<Option<Instant>>,
}

impl PackageCache {
    pub fn new(fetcher: Arc<PackageFetcher>) -> Self {
        Self {
            fetcher,
            entries: Mutex::new(HashMap::new()),
            previous_batch_start: Mutex::new(None),
        }
    }

    /// `get_or_fetch(url, stats)`: READY entries bump `lastUsed` and `stats.fromCache`;
    /// concurrent callers for a URL already FETCHING attach as waiters and share the
    /// outcome without a second network request; a first caller installs the entry and
    /// becomes the sole initiator, recording `stats.packageFetches`.
    pub async fn get_or_fetch(
        &self,
        url: &str,
        stats: &mut RequestStats,
    ) -> Result<Package, FetchError> {
        let entry = self.entry_for(url).await;

        if let Some(package) = entry.once.get() {
            stats.record_cache_hit();
            self.touch(&entry).await;
            return Ok(package.clone());
        }

        let initiated = Arc::new(AtomicBool::new(false));
        let initiated_marker = initiated.clone();
        let fetcher = self.fetcher.clone();
        let url_owned = url.to_string();

        let result = entry
            .once
            .get_or_try_init(|| async move {
                initiated_marker.store(true, Ordering::SeqCst);
                let content = fetcher.fetch(&url_owned).await?;
                Ok(Package {
                    url: url_owned,
                    size_bytes: content.len(),
                    content: Arc::new(content),
                    fetched_at: Instant::now(),
                })
            })
            .await;

        if initiated.load(Ordering::SeqCst) && result.is_ok() {
            stats.record_fetch();
        }

        self.touch(&entry).await;
        result.cloned()
    }

    async fn entry_for(&self, url: &str) -> Arc<Entry> {
        let mut entries = self.entries.lock().await;
        entries
            .entry(url.to_string())
            .or_insert_with(|| Arc::new(Entry::new()))
            .clone()
    }

    async fn touch(&self, entry: &Entry) {
        *entry.last_used.lock().unwrap() = Instant::now();
    }

    /// Drops every entry. In-flight fetches already holding an `Arc<Entry>` complete
    /// independently of map membership, so their waiters still observe the outcome.
    pub async fn flush_all(&self) {
        self.entries.lock().await.clear();
    }

    /// Called at the start of every render, before this render's own fetches begin.
    ///
    /// The cache is meant to persist a hot set *across* renders, not just within one -
    /// dropping every READY entry here would mean no fetched package ever survives into
    /// a later render, making this indistinguishable from `flush_all`/`/flush`. Instead,
    /// only entries not touched since the *previous* call to `flush_unused` are evicted:
    /// anything the render that just finished fetched or cache-hit necessarily has a
    /// `lastUsed` after that previous call, so it survives into the render now starting.
    /// The first call has no previous watermark and evicts nothing. Entries still
    /// mid-fetch (FETCHING, uninitialized) belong to a concurrently overlapping render
    /// and are always left alone so their waiters are not stranded.
    pub async fn flush_unused(&self) {
        let now = Instant::now();
        let mut previous_batch_start = self.previous_batch_start.lock().await;
        let cutoff = *previous_batch_start;

        self.entries.lock().await.retain(|_, entry| {
            entry.once.get().is_none()
                || match cutoff {
                    Some(cutoff) => *entry.last_used.lock().unwrap() >= cutoff,
                    None => true,
                }
        });

        *previous_batch_start = Some(now);
    }

    /// Sum of `sizeBytes` across all currently-READY entries, for observability.
    pub async fn size(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter_map(|e| e.once.get())
            .map(|p| p.size_bytes)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> Arc<PackageFetcher> {
        Arc::new(PackageFetcher::new(3, std::time::Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn test_cache_hit_records_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
            .expect(1)
            .mount(&server)
            .await;

        let cache = PackageCache::new(fetcher());
        let url = format!("{}/a.js", server.uri());
        let mut stats = RequestStats::new(0);

        cache.get_or_fetch(&url, &mut stats).await.unwrap();
        cache.get_or_fetch(&url, &mut stats).await.unwrap();

        assert_eq!(stats.package_fetches, 1);
        assert_eq!(stats.from_cache, 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetch_single_flight() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.js"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("x")
                    .set_delay(std::time::Duration::from_millis(50)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(PackageCache::new(fetcher()));
        let url = format!("{}/a.js", server.uri());

        let mut handles = vec![];
        for _ in 0..5 {
            let cache = cache.clone();
            let url = url.clone();
            handles.push(tokio::spawn(async move {
                let mut stats = RequestStats::new(0);
                let result = cache.get_or_fetch(&url, &mut stats).await;
                (result.is_ok(), stats.package_fetches)
            }));
        }

        let mut total_initiators = 0;
        for h in handles {
            let (ok, fetches) = h.await.unwrap();
            assert!(ok);
            total_initiators += fetches;
        }
        assert_eq!(total_initiators, 1);
    }

    #[tokio::test]
    async fn test_flush_all_clears_ready_entries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .expect(2)
            .mount(&server)
            .await;

        let cache = PackageCache::new(fetcher());
        let url = format!("{}/a.js", server.uri());
        let mut stats = RequestStats::new(0);

        cache.get_or_fetch(&url, &mut stats).await.unwrap();
        cache.flush_all().await;
        cache.get_or_fetch(&url, &mut stats).await.unwrap();

        assert_eq!(stats.package_fetches, 2);
    }

    #[tokio::test]
    async fn test_flush_unused_keeps_entries_touched_by_previous_render() {
        // §8 scenario 5: a URL fetched by one render must still be cached for the
        // next one - flush_unused is not a synonym for flush_all.
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x"))
            .expect(1)
            .mount(&server)
            .await;

        let cache = PackageCache::new(fetcher());
        let url = format!("{}/a.js", server.uri());
        let mut stats = RequestStats::new(0);

        // Render 1: fetches and caches the package.
        cache.get_or_fetch(&url, &mut stats).await.unwrap();

        // Render 2 begins: flush_unused runs before render 2's own fetches. The
        // entry was touched during render 1, which is all flush_unused's first
        // call (no previous watermark yet) can see, so nothing is evicted.
        cache.flush_unused().await;
        cache.get_or_fetch(&url, &mut stats).await.unwrap();

        assert_eq!(stats.package_fetches, 1);
        assert_eq!(stats.from_cache, 1);
    }

    #[tokio::test]
    async fn test_flush_unused_evicts_entries_not_touched_by_previous_render() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("b"))
            .expect(2)
            .mount(&server)
            .await;

        let cache = PackageCache::new(fetcher());
        let url_a = format!("{}/a.js", server.uri());
        let url_b = format!("{}/b.js", server.uri());
        let mut stats = RequestStats::new(0);

        // Render 1 fetches both A and B.
        cache.get_or_fetch(&url_a, &mut stats).await.unwrap();
        cache.get_or_fetch(&url_b, &mut stats).await.unwrap();

        // Render 2 begins: flush_unused's first call evicts nothing (no previous
        // watermark). Render 2 only touches A.
        cache.flush_unused().await;
        cache.get_or_fetch(&url_a, &mut stats).await.unwrap();

        // Render 3 begins: flush_unused's cutoff is now render 2's start. A was
        // touched during render 2 and survives; B was last touched in render 1,
        // before that cutoff, and is evicted.
        cache.flush_unused().await;
        cache.get_or_fetch(&url_a, &mut stats).await.unwrap();
        cache.get_or_fetch(&url_b, &mut stats).await.unwrap();

        assert_eq!(stats.package_fetches, 3); // A once, B fetched twice (render 1 and render 3).
        assert_eq!(stats.from_cache, 2); // A hit on render 2 and render 3.
    }

    #[tokio::test]
    async fn test_failed_fetch_is_not_retained() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.js"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let cache = PackageCache::new(Arc::new(PackageFetcher::new(
            1,
            std::time::Duration::from_secs(5),
        )));
        let url = format!("{}/a.js", server.uri());
        let mut stats = RequestStats::new(0);

        let result = cache.get_or_fetch(&url, &mut stats).await;
        assert!(result.is_err());
        assert_eq!(stats.package_fetches, 0);
    }
}
