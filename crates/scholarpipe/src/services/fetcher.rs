//! Resilient outbound HTTP for link validation and adapter traffic.
//!
//! A single shared `reqwest` client with connection pooling serves the whole
//! process. Every request goes through the per-domain rate limiter, carries
//! browser-like headers with a rotating user-agent, and retries network
//! failures and 5xx responses with capped exponential backoff.
//!
//! TLS verification is relaxed when configured (the default for ingest):
//! many small institutional portals run with self-signed or expired
//! certificates, and refusing them would silently drop whole sources. The
//! flag is surfaced in config validation as a warning.

use crate::services::rate_limiter::RateLimiter;
use crate::utils::url::parse_http_url;
use log::{debug, warn};
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, Method};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Tunables for the shared HTTP client.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Total per-request timeout, redirects and body included.
    pub request_timeout: Duration,
    /// Automatic redirect cap.
    pub max_redirects: usize,
    /// Attempts per logical request (1 initial + retries).
    pub max_attempts: usize,
    /// First retry delay; doubles per retry.
    pub backoff_base: Duration,
    /// Upper bound on a single retry delay.
    pub backoff_cap: Duration,
    /// Accept self-signed/invalid upstream certificates.
    pub accept_invalid_certs: bool,
    /// Rotation set for the User-Agent header.
    pub user_agents: Vec<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(15),
            request_timeout: Duration::from_secs(30),
            max_redirects: 5,
            max_attempts: 3,
            backoff_base: Duration::from_secs(2),
            backoff_cap: Duration::from_secs(10),
            accept_invalid_certs: true,
            user_agents: crate::config::settings::default_user_agents(),
        }
    }
}

/// Outcome of a successful HTTP exchange (any status code).
///
/// 4xx and 5xx responses are still `Ok` at this layer; only transport-level
/// failures become [`FetchError`]. `final_url` is the post-redirect URL.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub final_url: String,
    pub headers: HeaderMap,
    pub body: String,
    pub elapsed: Duration,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
    #[error("network error after {attempts} attempts: {message}")]
    Network { attempts: usize, message: String },
}

/// Shared outbound HTTP client with rate limiting and retries.
///
/// Cheap to clone via `Arc`; the orchestrator constructs one and hands it to
/// the validator and every adapter.
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    config: FetcherConfig,
    limiter: Arc<RateLimiter>,
}

impl Fetcher {
    /// Builds the shared client.
    ///
    /// # Panics
    ///
    /// Panics when the TLS backend cannot initialize; this only happens at
    /// startup and indicates a broken build environment.
    pub fn new(config: FetcherConfig, limiter: Arc<RateLimiter>) -> Self {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            config,
            limiter,
        }
    }

    /// Full GET: status, post-redirect URL, headers, body, elapsed time.
    pub async fn get(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.request(Method::GET, url).await
    }

    /// Cheap liveness probe; the body is always empty.
    pub async fn head(&self, url: &str) -> Result<FetchResponse, FetchError> {
        self.request(Method::HEAD, url).await
    }

    async fn request(&self, method: Method, url: &str) -> Result<FetchResponse, FetchError> {
        let parsed = parse_http_url(url).ok_or_else(|| FetchError::InvalidUrl {
            url: url.to_string(),
            message: "not an absolute http(s) URL".to_string(),
        })?;
        let host = parsed
            .host_str()
            .ok_or_else(|| FetchError::InvalidUrl {
                url: url.to_string(),
                message: "missing host".to_string(),
            })?
            .to_string();

        let mut last_error = String::new();
        for attempt in 1..=self.config.max_attempts {
            if attempt > 1 {
                let delay = self.backoff(attempt - 1);
                debug!(
                    "Retrying {} (attempt {}/{}) after {:?}",
                    url, attempt, self.config.max_attempts, delay
                );
                sleep(delay).await;
            }

            let _permit = self.limiter.acquire(&host).await;
            let started = Instant::now();
            let send_result = self
                .client
                .request(method.clone(), parsed.clone())
                .headers(self.browser_headers())
                .send()
                .await;

            match send_result {
                Ok(response) => {
                    let status = response.status().as_u16();
                    // Any status below 500 is a real answer; 5xx is retried.
                    if status >= 500 && attempt < self.config.max_attempts {
                        warn!("{} returned {}, will retry", url, status);
                        last_error = format!("upstream returned {}", status);
                        continue;
                    }

                    let final_url = response.url().to_string();
                    let headers = response.headers().clone();
                    let body = if method == Method::HEAD {
                        String::new()
                    } else {
                        match response.text().await {
                            Ok(text) => text,
                            Err(e) => {
                                last_error = format!("body read failed: {}", e);
                                if attempt < self.config.max_attempts {
                                    continue;
                                }
                                return Err(FetchError::Network {
                                    attempts: attempt,
                                    message: last_error,
                                });
                            }
                        }
                    };

                    return Ok(FetchResponse {
                        status,
                        final_url,
                        headers,
                        body,
                        elapsed: started.elapsed(),
                    });
                }
                Err(e) => {
                    last_error = e.to_string();
                    debug!("Request to {} failed: {}", url, last_error);
                }
            }
        }

        Err(FetchError::Network {
            attempts: self.config.max_attempts,
            message: last_error,
        })
    }

    /// Delay before retry number `retry` (1-based), doubling from the base
    /// and clamped to the cap.
    fn backoff(&self, retry: usize) -> Duration {
        let factor = 1u32 << (retry.saturating_sub(1)).min(16) as u32;
        let delay = self.config.backoff_base.saturating_mul(factor);
        delay.min(self.config.backoff_cap)
    }

    fn browser_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-IN,en;q=0.9,hi;q=0.8"),
        );
        if let Some(agent) = self.pick_user_agent() {
            if let Ok(value) = HeaderValue::from_str(&agent) {
                headers.insert(USER_AGENT, value);
            }
        }
        headers
    }

    fn pick_user_agent(&self) -> Option<String> {
        if self.config.user_agents.is_empty() {
            return None;
        }
        let idx = rand::thread_rng().gen_range(0..self.config.user_agents.len());
        Some(self.config.user_agents[idx].clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::rate_limiter::DomainPolicy;

    fn quick_fetcher(max_attempts: usize) -> Fetcher {
        let limiter = Arc::new(RateLimiter::new(
            Duration::from_millis(1),
            DomainPolicy::new(1, 4),
        ));
        Fetcher::new(
            FetcherConfig {
                max_attempts,
                backoff_base: Duration::from_millis(10),
                backoff_cap: Duration::from_millis(20),
                ..FetcherConfig::default()
            },
            limiter,
        )
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let limiter = Arc::new(RateLimiter::new(
            Duration::from_millis(1),
            DomainPolicy::new(1, 4),
        ));
        let fetcher = Fetcher::new(FetcherConfig::default(), limiter);
        assert_eq!(fetcher.backoff(1), Duration::from_secs(2));
        assert_eq!(fetcher.backoff(2), Duration::from_secs(4));
        assert_eq!(fetcher.backoff(3), Duration::from_secs(8));
        // capped at 10s
        assert_eq!(fetcher.backoff(4), Duration::from_secs(10));
        assert_eq!(fetcher.backoff(10), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_without_network() {
        let fetcher = quick_fetcher(1);
        let err = fetcher.get("not-a-url").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));

        let err = fetcher.get("ftp://example.com/x").await.unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn test_get_returns_body_and_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/scheme")
            .with_status(200)
            .with_body("scholarship page")
            .create_async()
            .await;

        let fetcher = quick_fetcher(1);
        let resp = fetcher
            .get(&format!("{}/scheme", server.url()))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "scholarship page");
        assert!(resp.is_success());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let mut server = mockito::Server::new_async().await;
        let failing = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let fetcher = quick_fetcher(3);
        let resp = fetcher
            .get(&format!("{}/flaky", server.url()))
            .await
            .unwrap();
        // Last attempt's 5xx is returned, not an error.
        assert_eq!(resp.status, 503);
        failing.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let not_found = server
            .mock("GET", "/missing")
            .with_status(404)
            .with_body("Page not found")
            .expect(1)
            .create_async()
            .await;

        let fetcher = quick_fetcher(3);
        let resp = fetcher
            .get(&format!("{}/missing", server.url()))
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
        not_found.assert_async().await;
    }

    #[tokio::test]
    async fn test_head_has_empty_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/probe")
            .with_status(200)
            .create_async()
            .await;

        let fetcher = quick_fetcher(1);
        let resp = fetcher
            .head(&format!("{}/probe", server.url()))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert!(resp.body.is_empty());
    }
}
