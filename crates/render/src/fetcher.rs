//! Package fetcher: HTTP GETs with retry, feeding the cache (§4.2).

use std::time::Duration;

use thiserror::Error;

/// Errors from a package fetch, after retries are exhausted.
#[derive(Error, Debug, Clone)]
#[error("Failed to fetch package {url}: {cause} (last status: {last_status:?})")]
pub struct FetchError {
    pub url: String,
    pub last_status: Option<u16>,
    pub cause: String,
}

/// Shared, process-wide HTTP client for fetching JS packages.
///
/// `reqwest::Client` is cheap to clone (an `Arc` internally) and keeps a connection
/// pool alive across requests, per §4.2 "connection pool is shared process-wide".
pub struct PackageFetcher {
    client: reqwest::Client,
    attempts: u32,
    per_attempt_timeout: Duration,
}

impl PackageFetcher {
    pub fn new(attempts: u32, per_attempt_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            attempts: attempts.max(1),
            per_attempt_timeout,
        }
    }

    /// Fetch one package's body, retrying transport errors and non-2xx
    /// responses up to `attempts` total tries. A malformed URL is not
    /// retried - it cannot succeed on a second attempt.
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if reqwest::Url::parse(url).is_err() {
            return Err(FetchError {
                url: url.to_string(),
                last_status: None,
                cause: "malformed URL".to_string(),
            });
        }

        let mut last_status = None;
        let mut last_cause = String::new();

        for attempt in 1..=self.attempts {
            match tokio::time::timeout(self.per_attempt_timeout, self.client.get(url).send()).await
            {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.text().await.map_err(|e| FetchError {
                            url: url.to_string(),
                            last_status: Some(status.as_u16()),
                            cause: e.to_string(),
                        });
                    }
                    last_status = Some(status.as_u16());
                    last_cause = format!("HTTP {status}");
                }
                Ok(Err(e)) => {
                    last_cause = e.to_string();
                }
                Err(_) => {
                    last_cause = format!("timed out after {:?}", self.per_attempt_timeout);
                }
            }

            if attempt < self.attempts {
                tokio::time::sleep(Duration::from_millis(100 * attempt as u64)).await;
            }
        }

        Err(FetchError {
            url: url.to_string(),
            last_status,
            cause: last_cause,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
            .mount(&server)
            .await;

        let fetcher = PackageFetcher::new(3, Duration::from_secs(5));
        let body = fetcher
            .fetch(&format!("{}/a.js", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "console.log(1)");
    }

    #[tokio::test]
    async fn test_fetch_retries_then_fails_on_persistent_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.js"))
            .respond_with(ResponseTemplate::new(404))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = PackageFetcher::new(3, Duration::from_secs(5));
        let err = fetcher
            .fetch(&format!("{}/missing.js", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.last_status, Some(404));
    }

    #[tokio::test]
    async fn test_fetch_succeeds_after_transient_500() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky.js"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky.js"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let fetcher = PackageFetcher::new(3, Duration::from_secs(5));
        let body = fetcher
            .fetch(&format!("{}/flaky.js", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_malformed_url_not_retried() {
        let fetcher = PackageFetcher::new(3, Duration::from_secs(5));
        let err = fetcher.fetch("not-a-url").await.unwrap_err();
        assert!(err.last_status.is_none());
        assert_eq!(err.cause, "malformed URL");
    }
}
