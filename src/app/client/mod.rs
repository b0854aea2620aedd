//! HTTP client for the DWD open data server
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: Core HTTP operations with rate limiting and retries
//!
//! One client is shared by all fetch workers so that the rate limit and the
//! connection pool apply to the batch as a whole.

use tracing::info;
use url::Url;

use crate::errors::DownloadResult;

pub mod config;
pub mod http;

pub use config::ClientConfig;

use http::HttpHandler;

/// HTTP client for the open data file server
#[derive(Debug)]
pub struct OpenDataClient {
    http_handler: HttpHandler,
}

impl OpenDataClient {
    /// Creates a client with default configuration
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if HTTP client creation fails
    pub fn new() -> DownloadResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a client with custom configuration
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::ConfigurationError` for an invalid configuration
    /// or proxy
    pub fn with_config(config: ClientConfig) -> DownloadResult<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, &config)?;

        match &config.proxy {
            Some(proxy) => info!("Created open data client using proxy {}", proxy),
            None => info!("Created open data client"),
        }

        Ok(Self { http_handler })
    }

    /// Downloads a file into memory
    ///
    /// # Errors
    ///
    /// Returns `DownloadError` if the request fails after retries, the server
    /// answers with a non-success status or the body cannot be read
    pub async fn fetch(&self, url: &Url) -> DownloadResult<Vec<u8>> {
        self.http_handler.get_bytes(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::DownloadError;

    #[test]
    fn test_client_creation() {
        assert!(OpenDataClient::new().is_ok());
        assert!(OpenDataClient::with_config(ClientConfig::default().with_proxy("proxy:8080")).is_ok());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let result = OpenDataClient::with_config(ClientConfig::default().with_rate_limit(0));
        assert!(matches!(result, Err(DownloadError::ConfigurationError(_))));
    }
}
