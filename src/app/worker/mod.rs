//! Fetch workers
//!
//! Workers pull [`DownloadJob`](crate::app::models::DownloadJob)s from a shared
//! [`JobQueue`], execute them with a [`FetchWorker`] and send one
//! [`JobOutcome`] per job back to the orchestrator.
//!
//! # Module Organization
//!
//! - [`core`] - the fetch worker and its queue loop
//! - [`queue`] - in-memory job queue
//! - [`types`] - job outcomes and failure causes

pub mod core;
pub mod queue;
pub mod types;

pub use self::core::{destination_path, FetchWorker};
pub use queue::JobQueue;
pub use types::{FailureCause, JobOutcome};
