//! Core application logic for DWD Fetcher
//!
//! This module contains the main application components: the model catalog,
//! run timestamp resolution, URL templates, job expansion, the HTTP client, the
//! fetch worker and the download orchestrator.
//!
//! Data flows strictly downward: the timestamp resolver and the catalog feed
//! the job expander, the expander feeds the orchestrator, and the orchestrator
//! hands each job to a fetch worker which renders its URL exactly once.

pub mod catalog;
pub mod client;
pub mod decompress;
pub mod expander;
pub mod models;
pub mod orchestrator;
pub mod template;
pub mod timestamp;
pub mod worker;

// Re-export main public API
pub use catalog::ModelCatalog;
pub use client::{ClientConfig, OpenDataClient};
pub use expander::expand;
pub use models::{
    DownloadJob, DownloadRequest, FetchOptions, LevelSelection, LevelType, ModelSpec,
};
pub use orchestrator::{BatchResult, Orchestrator, OrchestratorConfig, ProgressEvent};
pub use template::{Template, TemplateBindings};
pub use timestamp::{
    format_run_timestamp, resolve_run_timestamp, Clock, FixedClock, SystemClock,
};
pub use worker::{FetchWorker, JobOutcome};
