//! Core fetch worker implementation
//!
//! A [`FetchWorker`] executes one [`DownloadJob`] at a time: it renders the
//! job's URL, decides the local path, downloads and decompresses the payload and
//! writes it atomically. Every failure is folded into a [`JobOutcome`], so a
//! broken file never stops the rest of the batch.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use super::queue::JobQueue;
use super::types::JobOutcome;
use crate::app::client::OpenDataClient;
use crate::app::decompress::Compression;
use crate::app::models::{DownloadJob, FetchOptions};
use crate::constants::files;
use crate::errors::{DownloadError, DownloadResult};

/// Executes download jobs against the open data server
#[derive(Debug, Clone)]
pub struct FetchWorker {
    client: Arc<OpenDataClient>,
    options: FetchOptions,
}

impl FetchWorker {
    /// Create a worker sharing `client` with the rest of the batch
    pub fn new(client: Arc<OpenDataClient>, options: FetchOptions) -> Self {
        Self { client, options }
    }

    /// Execute one job
    ///
    /// Never fails: template, transport, status, decompression and filesystem
    /// errors are all reported as `JobOutcome::Failed`.
    pub async fn fetch(&self, job: &DownloadJob) -> JobOutcome {
        let url = match job.url() {
            Ok(url) => url,
            Err(e) => {
                let error = DownloadError::from(e);
                warn!("Cannot render URL for {}: {}", job, error);
                return JobOutcome::failed(String::new(), &error);
            }
        };

        let path = match destination_path(job, &url, self.options.compressed_output) {
            Ok(path) => path,
            Err(e) => {
                warn!("Cannot determine destination for {}: {}", url, e);
                return JobOutcome::failed(url, &e);
            }
        };

        if !self.options.dry_run {
            // Racing workers may create the same directory; create_dir_all tolerates that
            if let Err(e) = tokio::fs::create_dir_all(&job.dest_dir).await {
                let error = DownloadError::io(&job.dest_dir, e);
                warn!("{}", error);
                return JobOutcome::failed(url, &error);
            }
        }

        if self.options.skip_existing && path.exists() {
            debug!("Skipping existing file {}", path.display());
            return JobOutcome::Skipped { path };
        }

        if self.options.dry_run {
            info!("dry-run: {} -> {}", url, path.display());
            return JobOutcome::Success {
                url,
                path,
                bytes: 0,
            };
        }

        match self.download(&url, &path).await {
            Ok(bytes) => {
                debug!("Saved {} ({} bytes)", path.display(), bytes);
                JobOutcome::Success { url, path, bytes }
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                JobOutcome::failed(url, &e)
            }
        }
    }

    /// Download, decompress and write one file
    async fn download(&self, url: &str, path: &Path) -> DownloadResult<u64> {
        let parsed = Url::parse(url).map_err(|e| DownloadError::InvalidUrl {
            url: url.to_string(),
            error: e.to_string(),
        })?;

        let payload = self.client.fetch(&parsed).await?;

        let compression = if self.options.compressed_output {
            Compression::None
        } else {
            Compression::from_file_name(parsed.path())
        };

        let path_buf = path.to_path_buf();
        let source_name = url.to_string();
        tokio::task::spawn_blocking(move || {
            write_payload(&payload, compression, &path_buf, &source_name)
        })
        .await
        .map_err(|e| {
            DownloadError::io(path, std::io::Error::new(std::io::ErrorKind::Other, e))
        })?
    }

    /// Pull jobs from `queue` until it is empty or `cancel` fires
    ///
    /// A job already taken always runs to completion. Returns the number of
    /// jobs this worker processed.
    pub async fn run(
        self: Arc<Self>,
        worker_id: usize,
        queue: Arc<JobQueue>,
        outcome_tx: mpsc::Sender<JobOutcome>,
        cancel: CancellationToken,
    ) -> usize {
        debug!("Worker {} starting", worker_id);
        let mut processed = 0;

        loop {
            if cancel.is_cancelled() {
                debug!("Worker {} stopping on cancellation", worker_id);
                break;
            }

            let Some(job) = queue.pop().await else {
                break;
            };

            debug!("Worker {} fetching {}", worker_id, job);
            let outcome = Arc::clone(&self).fetch_in_task(job).await;
            processed += 1;

            if outcome_tx.send(outcome).await.is_err() {
                warn!("Worker {} outcome channel closed", worker_id);
                break;
            }
        }

        debug!("Worker {} finished after {} jobs", worker_id, processed);
        processed
    }

    /// Run one fetch in its own task so a panic fails only that job
    async fn fetch_in_task(self: Arc<Self>, job: DownloadJob) -> JobOutcome {
        let label = job.to_string();
        let url = job.url().unwrap_or_default();
        let handle = tokio::spawn(async move { self.fetch(&job).await });
        join_outcome(handle, label, url).await
    }
}

/// Await a fetch task, turning an abnormal end into a failed outcome
async fn join_outcome(handle: JoinHandle<JobOutcome>, label: String, url: String) -> JobOutcome {
    match handle.await {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Fetch task for {} failed: {}", label, e);
            JobOutcome::failed(
                url,
                &DownloadError::TaskFailed {
                    job: label,
                    reason: e.to_string(),
                },
            )
        }
    }
}

/// Local path a job is written to
///
/// Uses the job's filename override when set, otherwise the last URL path
/// segment, with the compression suffix removed unless the payload is kept
/// compressed.
pub fn destination_path(
    job: &DownloadJob,
    url: &str,
    compressed_output: bool,
) -> DownloadResult<PathBuf> {
    if let Some(name) = &job.file_name {
        return Ok(job.dest_dir.join(name));
    }

    let invalid = || DownloadError::InvalidUrl {
        url: url.to_string(),
        error: "URL has no file name".to_string(),
    };

    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let name = without_query.rsplit('/').next().ok_or_else(invalid)?;
    if name.is_empty() {
        return Err(invalid());
    }

    let name = if compressed_output {
        name
    } else {
        Compression::from_file_name(name).strip_suffix(name)
    };
    Ok(job.dest_dir.join(name))
}

/// Decompress and atomically write a payload (blocking)
fn write_payload(
    payload: &[u8],
    compression: Compression,
    path: &Path,
    source_name: &str,
) -> DownloadResult<u64> {
    let data = compression
        .decompress(payload)
        .map_err(|e| DownloadError::Decompression {
            path: source_name.to_string(),
            reason: e.to_string(),
        })?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::Builder::new()
        .prefix(files::TEMP_FILE_PREFIX)
        .tempfile_in(dir)
        .map_err(|e| DownloadError::io(dir, e))?;

    temp.write_all(&data)
        .map_err(|e| DownloadError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| DownloadError::io(temp.path(), e))?;

    temp.persist(path).map_err(|e| DownloadError::io(path, e.error))?;

    Ok(data.len() as u64)
}
