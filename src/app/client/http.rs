//! Core HTTP operations with rate limiting and retry logic
//!
//! This module provides the fundamental HTTP request operations with
//! built-in resilience patterns: a shared rate limiter with jitter and
//! exponential backoff on transport errors, 429 and 503 responses.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{clock::DefaultClock, state::InMemoryState, Jitter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::app::client::config::ClientConfig;
use crate::constants::limits;
use crate::errors::{DownloadError, DownloadResult};

type DirectRateLimiter = RateLimiter<governor::state::NotKeyed, InMemoryState, DefaultClock>;

/// HTTP operations handler with resilience patterns
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: DirectRateLimiter,
    max_retries: u32,
    retry_base_delay: Duration,
    request_timeout: Duration,
}

impl HttpHandler {
    /// Creates a new HttpHandler from a built client and its configuration
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::ConfigurationError` if the rate limit is zero
    pub fn new(client: Client, config: &ClientConfig) -> DownloadResult<Self> {
        let rate_limiter = Self::build_rate_limiter(config.rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay,
            request_timeout: config.request_timeout,
        })
    }

    /// Builds the rate limiter with the specified rate limit
    fn build_rate_limiter(rate_limit_rps: u32) -> DownloadResult<DirectRateLimiter> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| {
            DownloadError::ConfigurationError("Rate limit must be non-zero".to_string())
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Delay before retry number `attempt` (1-based), with random jitter
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.retry_base_delay.saturating_mul(2_u32.saturating_pow(attempt - 1));
        let jitter = base.mul_f64(limits::BACKOFF_JITTER_FACTOR * fastrand::f64());
        base + jitter
    }

    /// Fetches a successful HTTP response with rate limiting and retry logic
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::HttpStatus` for non-success statuses other than
    /// 429/503, and a retry-exhaustion error once the retry budget is spent.
    pub async fn get_response(&self, url: &Url) -> DownloadResult<reqwest::Response> {
        let mut retries = 0;
        loop {
            // Apply rate limiting with jitter to avoid thundering herd
            self.rate_limiter
                .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(
                    limits::RATE_LIMIT_JITTER_MS,
                )))
                .await;

            let error = match self.client.get(url.as_str()).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!("Fetched response: {} ({})", url, response.status());
                    return Ok(response);
                }
                Ok(response) => match response.status() {
                    StatusCode::TOO_MANY_REQUESTS => DownloadError::RateLimitExceeded,
                    StatusCode::SERVICE_UNAVAILABLE => DownloadError::ServerOverloaded,
                    status => {
                        return Err(DownloadError::HttpStatus {
                            status: status.as_u16(),
                            url: url.to_string(),
                        })
                    }
                },
                Err(e) if e.is_timeout() => DownloadError::Timeout {
                    seconds: self.request_timeout.as_secs(),
                },
                Err(e) => DownloadError::Http(e),
            };

            if retries >= self.max_retries || !error.is_retryable() {
                warn!("Giving up on {} after {} retries: {}", url, retries, error);
                return Err(match error {
                    DownloadError::Http(e) if retries > 0 => DownloadError::MaxRetriesExceeded {
                        max_retries: self.max_retries,
                        last_error: e.to_string(),
                    },
                    other => other,
                });
            }

            retries += 1;
            let delay = self.backoff_delay(retries);
            warn!(
                "Request to {} failed (attempt {}/{}): {}. Retrying in {}ms",
                url,
                retries,
                self.max_retries,
                error,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Fetches the full response body
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the request fails after retries or the body
    /// cannot be read
    pub async fn get_bytes(&self, url: &Url) -> DownloadResult<Vec<u8>> {
        let response = self.get_response(url).await?;
        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::Timeout {
                    seconds: self.request_timeout.as_secs(),
                }
            } else {
                DownloadError::Http(e)
            }
        })?;
        debug!("Read {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_handler(max_retries: u32) -> HttpHandler {
        let config = ClientConfig::default()
            .with_rate_limit(1000)
            .with_max_retries(max_retries)
            .with_retry_base_delay(Duration::from_millis(1));
        let client = config.build_http_client().unwrap();
        HttpHandler::new(client, &config).unwrap()
    }

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let rate_limiter = HttpHandler::build_rate_limiter(5).unwrap();
        rate_limiter.until_ready().await;
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        let result = HttpHandler::build_rate_limiter(0);
        assert!(matches!(result, Err(DownloadError::ConfigurationError(_))));
    }

    #[test]
    fn test_exponential_backoff() {
        let handler = test_handler(3);
        let handler = HttpHandler {
            retry_base_delay: Duration::from_millis(100),
            ..handler
        };

        let first = handler.backoff_delay(1);
        let third = handler.backoff_delay(3);
        assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(110));
        assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(440));
    }

    #[tokio::test]
    async fn test_get_bytes_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/file.grib2"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"GRIB".to_vec()))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/file.grib2", server.uri())).unwrap();
        let body = test_handler(0).get_bytes(&url).await.unwrap();
        assert_eq!(body, b"GRIB");
    }

    /// Test status handling
    ///
    /// Verifies a 404 is returned immediately without retries
    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing", server.uri())).unwrap();
        let err = test_handler(3).get_response(&url).await.unwrap_err();
        assert!(matches!(err, DownloadError::HttpStatus { status: 404, .. }));
    }

    /// Test backoff on overload
    ///
    /// Verifies 503 responses are retried until the budget is spent
    #[tokio::test]
    async fn test_service_unavailable_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/busy"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/busy", server.uri())).unwrap();
        let err = test_handler(2).get_response(&url).await.unwrap_err();
        assert!(matches!(err, DownloadError::ServerOverloaded));
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Port 9 (discard) is not expected to accept HTTP connections
        let url = Url::parse("http://127.0.0.1:9/nothing").unwrap();
        let err = test_handler(1).get_response(&url).await.unwrap_err();
        assert!(matches!(err, DownloadError::MaxRetriesExceeded { .. }));
        assert!(err.status().is_none());
    }
}
