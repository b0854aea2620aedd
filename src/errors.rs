//! Error types for DWD Fetcher
//!
//! Errors fall into two groups. Request-construction errors (bad timestamps,
//! templates, empty ranges, invalid concurrency) are fatal and are reported
//! before any job runs. Per-job download errors never escape the fetch worker;
//! they are folded into `Failed` outcomes of the batch result.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while turning user input into a batch of jobs
#[derive(Error, Debug)]
pub enum RequestError {
    /// Explicit model run is not `YYYYMMDDHH` or encodes an impossible date
    #[error("Invalid model run timestamp '{value}'. Expected YYYYMMDDHH in UTC")]
    InvalidTimestampFormat { value: String },

    /// Run interval of zero hours cannot be floored against
    #[error("Run interval must be at least one hour, got {hours}")]
    InvalidRunInterval { hours: u32 },

    /// Effective level list is empty
    #[error("Level range for {level_type} produces no levels")]
    EmptyLevelRange { level_type: String },

    /// Step range is empty (max below min, or no max given)
    #[error("Forecast step range is empty: min {min}, max {max}")]
    EmptyStepRange { min: u32, max: String },

    /// Concurrency must be at least one
    #[error("Concurrency must be at least 1, got {value}")]
    InvalidConcurrency { value: usize },

    /// Request names no fields
    #[error("Nothing to download: no {level_type} fields were given")]
    NoFields { level_type: String },

    /// Model not present in the catalog
    #[error("Unknown model '{model}'")]
    UnknownModel { model: String },

    /// Grid not offered by the model
    #[error("Grid '{grid}' is not supported by model '{model}'. Supported: {supported:?}")]
    UnsupportedGrid {
        model: String,
        grid: String,
        supported: Vec<String>,
    },

    /// Model publishes no files for the level type
    #[error("Model '{model}' has no URL pattern for level type '{level_type}'")]
    UnsupportedLevelType { model: String, level_type: String },

    /// Template failure while preparing jobs
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// URL and path template errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    /// Placeholder outside the fixed vocabulary
    #[error("Unknown placeholder '{{{name}}}' in template")]
    UnknownPlaceholder { name: String },

    /// Modifier that is not supported for the placeholder
    #[error("Unsupported modifier '{modifier}' for placeholder '{placeholder}'")]
    UnsupportedModifier {
        placeholder: String,
        modifier: String,
    },

    /// Unbalanced braces or empty placeholder
    #[error("Malformed template at byte {position}: {reason}")]
    Malformed { position: usize, reason: String },

    /// Model has no URL pattern for the job's level type
    #[error("Model '{model}' has no URL pattern for level type '{level_type}'")]
    MissingPattern { model: String, level_type: String },
}

/// Download and HTTP client errors
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Transport failure (connection, DNS, TLS, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out
    #[error("Request timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Server returned a non-success status
    #[error("Server responded with HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    /// Rendered URL does not parse
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Rate limit exceeded after retries
    #[error("Rate limit exceeded. Server responded with HTTP 429")]
    RateLimitExceeded,

    /// Server overloaded after retries
    #[error("Server overloaded. Server responded with HTTP 503")]
    ServerOverloaded,

    /// Maximum retries exceeded on transport errors
    #[error("Maximum retry attempts ({max_retries}) exceeded: {last_error}")]
    MaxRetriesExceeded { max_retries: u32, last_error: String },

    /// Payload could not be decompressed
    #[error("Failed to decompress {path}: {reason}")]
    Decompression { path: String, reason: String },

    /// Filesystem failure while creating directories or writing output
    #[error("File I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// URL template could not be rendered
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Invalid client configuration
    #[error("Client configuration error: {0}")]
    ConfigurationError(String),

    /// Job ended without an outcome of its own (panicked fetch or lost worker)
    #[error("Fetch task for {job} did not complete: {reason}")]
    TaskFailed { job: String, reason: String },
}

/// Coarse classification of a failed job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// Network, DNS or timeout failure
    Transport,
    /// Non-2xx response
    HttpStatus,
    /// Corrupt or unexpected compressed payload
    Decompression,
    /// Permission, disk space or path failure
    Filesystem,
    /// URL could not be rendered
    Template,
    /// Fetch task ended abnormally
    Internal,
}

impl DownloadError {
    /// Build an I/O error bound to the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify the error for reporting in a `Failed` outcome
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            DownloadError::HttpStatus { .. }
            | DownloadError::RateLimitExceeded
            | DownloadError::ServerOverloaded => FailureKind::HttpStatus,
            DownloadError::Http(_)
            | DownloadError::Timeout { .. }
            | DownloadError::InvalidUrl { .. }
            | DownloadError::MaxRetriesExceeded { .. }
            | DownloadError::ConfigurationError(_) => FailureKind::Transport,
            DownloadError::Decompression { .. } => FailureKind::Decompression,
            DownloadError::Io { .. } => FailureKind::Filesystem,
            DownloadError::Template(_) => FailureKind::Template,
            DownloadError::TaskFailed { .. } => FailureKind::Internal,
        }
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            DownloadError::HttpStatus { status, .. } => Some(*status),
            DownloadError::RateLimitExceeded => Some(429),
            DownloadError::ServerOverloaded => Some(503),
            DownloadError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if the error is transient and worth retrying
    pub fn is_retryable(&self) -> bool {
        match self {
            DownloadError::Http(e) => !e.is_builder() && !e.is_redirect(),
            DownloadError::Timeout { .. }
            | DownloadError::RateLimitExceeded
            | DownloadError::ServerOverloaded => true,
            DownloadError::HttpStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Model catalog loading errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Catalog file not found
    #[error("Model catalog not found: {path}")]
    NotFound { path: PathBuf },

    /// I/O error reading the catalog
    #[error("I/O error reading model catalog {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing error (also covers invalid templates inside the catalog)
    #[error("Invalid model catalog: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Model record is inconsistent
    #[error("Invalid model '{model}': {reason}")]
    InvalidModel { model: String, reason: String },

    /// Two records share one identifier
    #[error("Duplicate model '{model}' in catalog")]
    DuplicateModel { model: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Failed to serialize configuration")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// User config directory cannot be determined
    #[error("Could not determine user config directory")]
    NoConfigDir,
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Request construction error
    #[error(transparent)]
    Request(#[from] RequestError),

    /// Template error
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Download error
    #[error(transparent)]
    Download(#[from] DownloadError),

    /// Catalog error
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON serialization error (batch reports)
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Request(_) => "request",
            AppError::Template(_) => "template",
            AppError::Download(_) => "download",
            AppError::Catalog(_) => "catalog",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Request construction result type alias
pub type RequestResult<T> = std::result::Result<T, RequestError>;

/// Template result type alias
pub type TemplateResult<T> = std::result::Result<T, TemplateError>;

/// Download result type alias
pub type DownloadResult<T> = std::result::Result<T, DownloadError>;

/// Catalog result type alias
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_classification() {
        let status = DownloadError::HttpStatus {
            status: 404,
            url: "https://example.com/a".to_string(),
        };
        assert_eq!(status.failure_kind(), FailureKind::HttpStatus);
        assert_eq!(status.status(), Some(404));
        assert!(!status.is_retryable());

        let io = DownloadError::io(
            "/tmp/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(io.failure_kind(), FailureKind::Filesystem);
        assert_eq!(io.status(), None);

        let bad = DownloadError::Decompression {
            path: "a.bz2".to_string(),
            reason: "bad magic".to_string(),
        };
        assert_eq!(bad.failure_kind(), FailureKind::Decompression);

        assert_eq!(DownloadError::ServerOverloaded.status(), Some(503));
        assert!(DownloadError::Timeout { seconds: 5 }.is_retryable());

        let lost = DownloadError::TaskFailed {
            job: "icon/single-level t_2m step 000".to_string(),
            reason: "panicked".to_string(),
        };
        assert_eq!(lost.failure_kind(), FailureKind::Internal);
        assert!(!lost.is_retryable());
    }

    #[test]
    fn test_app_error_category() {
        let err: AppError = RequestError::InvalidConcurrency { value: 0 }.into();
        assert_eq!(err.category(), "request");
        assert!(err.to_string().contains("at least 1"));

        let err: AppError = TemplateError::UnknownPlaceholder {
            name: "foo".to_string(),
        }
        .into();
        assert_eq!(err.category(), "template");
        assert!(err.to_string().contains("{foo}"));
    }
}
