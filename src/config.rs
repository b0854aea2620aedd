//! Configuration management for DWD Fetcher
//!
//! This module provides the TOML configuration file, its search locations and
//! the environment overrides. Command-line flags are applied on top by the
//! CLI layer, so the precedence is: defaults, config file, environment, flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::{ClientConfig, FetchOptions, OrchestratorConfig};
use crate::constants::{env, files, http, limits, logging, workers};
use crate::errors::{AppError, ConfigError, Result};

/// Unified application configuration for TOML serialization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP client settings
    pub client: ClientConfig,
    /// Batch execution settings
    pub orchestrator: OrchestratorConfig,
    /// Where and how downloaded files are written
    pub output: OutputConfig,
    /// Model catalog source
    pub catalog: CatalogConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Output settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Destination root directory
    pub directory: PathBuf,
    /// Write every file directly into `directory`
    pub flat: bool,
    /// Keep payloads compressed as published
    pub compressed: bool,
    /// Skip jobs whose destination file already exists
    pub skip_existing: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            flat: false,
            compressed: false,
            skip_existing: true,
        }
    }
}

impl OutputConfig {
    /// Per-job flags derived from the output settings
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .with_compressed_output(self.compressed)
            .with_skip_existing(self.skip_existing)
    }
}

/// Catalog settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON catalog replacing the built-in one
    pub path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when no verbosity flag is given
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: logging::DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration with multi-source precedence:
    /// 1. Default values
    /// 2. Config file (if exists)
    /// 3. Environment variables
    ///
    /// # Errors
    ///
    /// Fails if an explicitly given file does not exist, or if a found file
    /// cannot be read or parsed.
    pub async fn load(config_file_override: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::default();

        let config_path = match config_file_override {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound { path }.into());
                }
                Some(path)
            }
            None => Self::find_config_file(),
        };

        if let Some(path) = config_path {
            debug!("Loading config from: {}", path.display());
            config = Self::load_from_file(&path).await?;
        }

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::generic(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: AppConfig = toml::from_str(&content).map_err(ConfigError::from)?;

        info!("Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_proxy_override(std::env::var(env::PROXY).ok());
    }

    fn apply_proxy_override(&mut self, proxy: Option<String>) {
        if let Some(proxy) = proxy.filter(|p| !p.trim().is_empty()) {
            debug!("Using proxy from {}", env::PROXY);
            self.client.proxy = Some(proxy);
        }
    }

    /// Check values that cannot be expressed in the types
    pub fn validate(&self) -> Result<()> {
        self.client
            .validate()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "client".to_string(),
                value: format!("{:?}", self.client),
                reason,
            })?;
        self.orchestrator.validate()?;
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                value: self.logging.level.clone(),
                reason: "Expected one of error, warn, info, debug, trace".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(ConfigError::from)?)
    }

    /// Write the commented default configuration file
    ///
    /// Writes to `path`, or to the user config location when `None`. An
    /// existing file is only replaced when `force` is set.
    pub async fn init(path: Option<PathBuf>, force: bool) -> Result<PathBuf> {
        let config_path = match path {
            Some(path) => path,
            None => Self::get_default_config_path()?,
        };

        if config_path.exists() && !force {
            return Err(AppError::generic(format!(
                "Configuration file already exists: {} (use --force to overwrite)",
                config_path.display()
            )));
        }

        if let Some(parent) = config_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::generic(format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tokio::fs::write(&config_path, Self::generate_default_config_content())
            .await
            .map_err(|e| {
                AppError::generic(format!(
                    "Failed to write config file {}: {}",
                    config_path.display(),
                    e
                ))
            })?;

        info!("Wrote default configuration to {}", config_path.display());
        Ok(config_path)
    }

    /// Find configuration file in standard locations
    pub fn find_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(files::LOCAL_CONFIG_FILE)];
        if let Ok(user_config) = Self::get_default_config_path() {
            search_paths.push(user_config);
        }

        for path in search_paths {
            if path.exists() {
                debug!("Found config file: {}", path.display());
                return Some(path);
            }
        }

        debug!("No config file found in standard locations");
        None
    }

    /// Get the default config file path for the current user
    pub fn get_default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join(files::CONFIG_DIR_NAME).join("config.toml"))
    }

    /// Generate default configuration content with helpful comments
    pub fn generate_default_config_content() -> String {
        format!(
            r#"# DWD Fetcher Configuration
# Every setting is optional; removed keys fall back to these defaults.
# Command-line flags take precedence over this file.

[client]
# Timeouts accept human readable durations such as "90s" or "2m"
request_timeout = "{request_timeout}s"
connect_timeout = "{connect_timeout}s"
tcp_keepalive = "30s"
tcp_nodelay = true
pool_idle_timeout = "{pool_idle}s"
pool_max_per_host = {pool_max}
# Requests per second against opendata.dwd.de
rate_limit_rps = {rps}
# Retries after the first attempt on timeouts, 429 and 503 responses
max_retries = {retries}
retry_base_delay = "{retry_delay}ms"
user_agent = "{user_agent}"
# proxy = "http://proxy.example.com:8080"  # Or set {proxy_env}

[orchestrator]
# Concurrent downloads
concurrency = {workers}
channel_buffer = {buffer}
enable_progress_bar = true

[output]
directory = "."
# Write all files into the directory itself instead of <model>/<run>/<field>
flat = false
# Keep .bz2 payloads as published
compressed = false
# Skip files that already exist (--reload disables this)
skip_existing = true

[catalog]
# JSON model catalog replacing the built-in one
# path = "/path/to/models.json"

[logging]
level = "{level}"  # error, warn, info, debug, trace
"#,
            request_timeout = http::DEFAULT_TIMEOUT.as_secs(),
            connect_timeout = http::CONNECT_TIMEOUT.as_secs(),
            pool_idle = http::POOL_IDLE_TIMEOUT.as_secs(),
            pool_max = http::POOL_MAX_PER_HOST,
            rps = limits::DEFAULT_RATE_LIMIT_RPS,
            retries = limits::MAX_RETRIES,
            retry_delay = limits::RETRY_BASE_DELAY_MS,
            user_agent = http::USER_AGENT,
            proxy_env = env::PROXY,
            workers = workers::DEFAULT_WORKER_COUNT,
            buffer = workers::CHANNEL_BUFFER_SIZE,
            level = logging::DEFAULT_LOG_LEVEL,
        )
    }
}
