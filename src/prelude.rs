//! Prelude module for DWD Fetcher Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use dwd_fetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use dwd_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let catalog = ModelCatalog::builtin()?;
//!     let spec = catalog.require("icon-eu")?;
//!     let run = resolve_run_timestamp(
//!         None,
//!         spec.publication_delay_minutes,
//!         spec.run_interval_hours,
//!         &SystemClock,
//!     )?;
//!
//!     let request = DownloadRequest::new("icon-eu", LevelType::SingleLevel, vec!["t_2m".into()])
//!         .with_steps(0, 6);
//!     let jobs = expand(&request, &spec, run)?;
//!
//!     let client = Arc::new(OpenDataClient::new()?);
//!     let orchestrator = Orchestrator::new(
//!         OrchestratorConfig::default(),
//!         FetchWorker::new(client, request.options),
//!     );
//!     let result = orchestrator.run(jobs).await?;
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Core orchestration
    BatchResult,
    ClientConfig,
    DownloadJob,
    // Requests and jobs
    DownloadRequest,
    FetchOptions,
    FetchWorker,
    JobOutcome,
    LevelSelection,
    LevelType,
    // Catalog
    ModelCatalog,
    ModelSpec,
    OpenDataClient,
    Orchestrator,
    OrchestratorConfig,
    SystemClock,
    Template,

    // Functions
    expand,
    format_run_timestamp,
    resolve_run_timestamp,
};

// Configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{DEFAULT_RATE_LIMIT_RPS, DEFAULT_WORKER_COUNT, USER_AGENT};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        let _client_config = ClientConfig::default();
        let _orchestrator_config = OrchestratorConfig::default();
        let _options = FetchOptions::default();
        let _config = AppConfig::default();

        assert_eq!(DEFAULT_WORKER_COUNT, 8);
        assert!(USER_AGENT.starts_with("DWD-Fetcher"));
    }

    /// Test prelude integration pattern
    ///
    /// Verifies the catalog, run resolution and expansion work together with
    /// prelude imports only
    #[tokio::test]
    async fn test_prelude_integration_pattern() {
        let catalog = ModelCatalog::builtin().unwrap();
        let spec = catalog.require("icon").unwrap();
        let run = resolve_run_timestamp(
            Some("2020121212"),
            spec.publication_delay_minutes,
            spec.run_interval_hours,
            &SystemClock,
        )
        .unwrap();

        let request = DownloadRequest::new("icon", LevelType::SingleLevel, vec!["t_2m".into()])
            .with_steps(0, 2)
            .with_dest_root(PathBuf::from("/tmp/nwp"));
        let jobs = expand(&request, &spec, run).unwrap();
        assert_eq!(jobs.len(), 3);
        assert_eq!(format_run_timestamp(run), "2020121212");
    }
}
