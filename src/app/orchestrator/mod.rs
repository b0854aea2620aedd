//! Download orchestration
//!
//! The orchestrator runs a batch of [`DownloadJob`]s against a bounded pool of
//! fetch workers and aggregates their outcomes into a [`BatchResult`].
//!
//! # Architecture
//!
//! - [`config`] - worker count and channel sizes
//! - [`stats`] - batch result, progress events and the outcome accumulator
//! - [`signals`] - Ctrl-C / SIGTERM cancellation
//!
//! Workers pull jobs from a shared queue and send exactly one outcome per job
//! over an mpsc channel. Only the orchestrator task touches the accumulator,
//! so results need no locking.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dwd_fetcher::app::{
//!     expand, FetchOptions, FetchWorker, ModelCatalog, OpenDataClient, Orchestrator,
//!     OrchestratorConfig, DownloadRequest, LevelType,
//! };
//! use dwd_fetcher::app::timestamp::{resolve_run_timestamp, SystemClock};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = ModelCatalog::builtin()?;
//! let spec = catalog.require("icon-d2")?;
//! let request = DownloadRequest::new("icon-d2", LevelType::SingleLevel, vec!["t_2m".into()])
//!     .with_steps(0, 3)
//!     .with_dest_root("data");
//! let run = resolve_run_timestamp(None, spec.publication_delay_minutes, spec.run_interval_hours, &SystemClock)?;
//! let jobs = expand(&request, &spec, run)?;
//!
//! let worker = FetchWorker::new(Arc::new(OpenDataClient::new()?), request.options);
//! let orchestrator = Orchestrator::new(OrchestratorConfig::default().with_concurrency(4), worker);
//! let result = orchestrator.run(jobs).await?;
//! println!("{}", result.summary());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod signals;
pub mod stats;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::app::models::DownloadJob;
use crate::app::worker::{FetchWorker, JobOutcome, JobQueue};
use crate::errors::{DownloadError, RequestResult};

pub use config::OrchestratorConfig;
pub use signals::SignalHandler;
pub use stats::{format_bytes, format_duration, BatchResult, ProgressEvent};

use stats::BatchAccumulator;

/// Runs batches of download jobs
pub struct Orchestrator {
    config: OrchestratorConfig,
    worker: Arc<FetchWorker>,
    cancel: CancellationToken,
    progress_tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl Orchestrator {
    /// Create an orchestrator executing jobs with `worker`
    pub fn new(config: OrchestratorConfig, worker: FetchWorker) -> Self {
        Self {
            config,
            worker: Arc::new(worker),
            cancel: CancellationToken::new(),
            progress_tx: None,
        }
    }

    /// Send one [`ProgressEvent`] per outcome to `tx`
    ///
    /// Events are dropped rather than blocking the batch when the listener
    /// falls behind.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressEvent>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the batch from taking new jobs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Execute every job and aggregate the outcomes
    ///
    /// Returns only after all started jobs have finished. Individual failures
    /// never abort the batch; they are collected in the result.
    ///
    /// # Errors
    ///
    /// Returns `RequestError::InvalidConcurrency` before any job runs if the
    /// configured concurrency is zero.
    pub async fn run(&self, jobs: Vec<DownloadJob>) -> RequestResult<BatchResult> {
        self.config.validate()?;

        let started = Instant::now();
        let total = jobs.len();
        if total == 0 {
            info!("No jobs to run");
            return Ok(BatchResult::empty());
        }

        let worker_count = self.config.concurrency.min(total);
        info!(
            "Starting batch of {} jobs with {} workers",
            total, worker_count
        );

        let queue = Arc::new(JobQueue::new(jobs));
        let (outcome_tx, mut outcome_rx) = mpsc::channel(self.config.buffer());

        let handles: Vec<_> = (0..worker_count)
            .map(|worker_id| {
                tokio::spawn(Arc::clone(&self.worker).run(
                    worker_id,
                    Arc::clone(&queue),
                    outcome_tx.clone(),
                    self.cancel.child_token(),
                ))
            })
            .collect();
        // Channel closes once every worker has dropped its sender
        drop(outcome_tx);

        let mut accumulator = BatchAccumulator::new(total);
        while let Some(outcome) = outcome_rx.recv().await {
            if let JobOutcome::Failed { url, cause, .. } = &outcome {
                warn!("Job failed: {} ({})", url, cause);
            }
            accumulator.record(outcome.clone());
            self.report_progress(accumulator.recorded(), total, outcome);
        }

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!("Fetch worker task failed: {}", e);
            }
        }

        // Only cancellation may leave jobs behind; anything else is a failure
        if !self.cancel.is_cancelled() {
            let unrun = fail_unrun_jobs(&queue, &mut accumulator).await;
            if unrun > 0 {
                error!("{} jobs failed without a fetch worker to run them", unrun);
            }
        }

        let result = accumulator.finish(started.elapsed());
        if result.abandoned > 0 {
            warn!("Batch cancelled, {} jobs abandoned", result.abandoned);
        }
        info!("{}", result.summary());
        Ok(result)
    }

    fn report_progress(&self, completed: usize, total: usize, outcome: JobOutcome) {
        let Some(tx) = &self.progress_tx else {
            return;
        };

        let event = ProgressEvent {
            completed,
            total,
            outcome,
        };
        if let Err(e) = tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(_) => {
                    tracing::debug!("Progress channel full, skipping update");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    tracing::debug!("Progress channel closed");
                }
            }
        }
    }
}

/// Record a failed outcome for every job still queued
///
/// Returns the number of jobs failed this way.
async fn fail_unrun_jobs(queue: &JobQueue, accumulator: &mut BatchAccumulator) -> usize {
    let jobs = queue.drain().await;
    for job in &jobs {
        let error = DownloadError::TaskFailed {
            job: job.to_string(),
            reason: "no fetch worker left to run it".to_string(),
        };
        accumulator.record(JobOutcome::failed(job.url().unwrap_or_default(), &error));
    }
    jobs.len()
}
