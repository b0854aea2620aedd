//! Application constants for DWD Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Environment variable overriding the HTTP proxy
    pub const PROXY: &str = "DWD_FETCHER_PROXY";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("DWD-Fetcher/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 16;
}

/// Rate limiting and retry configuration
pub mod limits {
    /// Default rate limit for open data requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 20;

    /// Maximum retry attempts for failed requests
    pub const MAX_RETRIES: u32 = 3;

    /// Base delay for exponential backoff (milliseconds)
    pub const RETRY_BASE_DELAY_MS: u64 = 500;

    /// Upper bound of the random jitter added to rate limiter waits (milliseconds)
    pub const RATE_LIMIT_JITTER_MS: u64 = 100;

    /// Jitter factor for randomizing retry delays (0.0-1.0)
    pub const BACKOFF_JITTER_FACTOR: f64 = 0.1;
}

/// File operation constants
pub mod files {
    /// Suffix of bzip2 compressed payloads
    pub const BZIP2_SUFFIX: &str = ".bz2";

    /// Suffix of gzip compressed payloads
    pub const GZIP_SUFFIX: &str = ".gz";

    /// Prefix for temporary files written before the atomic rename
    pub const TEMP_FILE_PREFIX: &str = ".dwd-fetcher-";

    /// Default destination sub-directory pattern mirroring the remote tree
    pub const DEFAULT_DEST_PATTERN: &str = "{model!L}/{modelrun:>02d}/{param!L}";

    /// Default configuration file name in the working directory
    pub const LOCAL_CONFIG_FILE: &str = "dwd-fetcher.toml";

    /// Application directory below the user config directory
    pub const CONFIG_DIR_NAME: &str = "dwd-fetcher";
}

/// Worker and concurrency configuration
pub mod workers {
    /// Default number of concurrent fetch workers
    pub const DEFAULT_WORKER_COUNT: usize = 8;

    /// Channel buffer size for outcome and progress events
    pub const CHANNEL_BUFFER_SIZE: usize = 100;
}

/// Run timestamp handling
pub mod runs {
    /// Number of characters in an explicit `YYYYMMDDHH` run
    pub const RUN_TIMESTAMP_LEN: usize = 10;
}

/// Process exit status
pub mod exit {
    /// Largest failure count reported through the exit status
    pub const MAX_FAILURE_EXIT_CODE: i32 = 254;

    /// Exit status for fatal errors raised before any job ran
    ///
    /// Kept above every failure count so the two cannot be confused.
    pub const FATAL_EXIT_CODE: i32 = 255;
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "warn";
}

// Re-export commonly used constants for convenience
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use limits::{DEFAULT_RATE_LIMIT_RPS, MAX_RETRIES, RETRY_BASE_DELAY_MS};
pub use workers::DEFAULT_WORKER_COUNT;
