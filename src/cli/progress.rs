//! Progress display for download batches
//!
//! Consumes the orchestrator's [`ProgressEvent`] stream. When stderr is a
//! terminal an indicatif progress bar is drawn; otherwise a periodic text line
//! is written so that logs from cron jobs stay readable.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dwd_fetcher::cli::{ProgressConfig, ProgressDisplay};
//! use tokio::sync::mpsc;
//!
//! # async fn example() {
//! let (tx, rx) = mpsc::channel(100);
//! let display = ProgressDisplay::new(ProgressConfig::default());
//! let handle = display.spawn(24, rx);
//!
//! // hand `tx` to `Orchestrator::with_progress`, run the batch, drop it
//! drop(tx);
//! let _ = handle.await;
//! # }
//! ```

use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::orchestrator::{format_bytes, ProgressEvent};
use crate::app::JobOutcome;

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Draw a progress bar when stderr is a terminal
    pub enable_progress_bars: bool,
    /// Minimum time between text-mode reports
    pub text_report_interval: Duration,
    /// Maximum width for file names in the bar message
    pub max_filename_width: usize,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            text_report_interval: Duration::from_secs(10),
            max_filename_width: 40,
        }
    }
}

/// Renders progress events as a bar or as text
pub struct ProgressDisplay {
    config: ProgressConfig,
    is_terminal: bool,
}

impl ProgressDisplay {
    /// Create a new progress display with the given configuration
    pub fn new(config: ProgressConfig) -> Self {
        Self {
            config,
            is_terminal: atty::is(atty::Stream::Stderr),
        }
    }

    /// True when a progress bar will be drawn
    pub fn uses_bar(&self) -> bool {
        self.config.enable_progress_bars && self.is_terminal
    }

    /// Consume events until the sender side is dropped
    pub fn spawn(self, total_jobs: usize, events: mpsc::Receiver<ProgressEvent>) -> JoinHandle<()> {
        if self.uses_bar() {
            match Self::build_bar(total_jobs) {
                Ok(bar) => return tokio::spawn(Self::run_bar(bar, self.config, events)),
                Err(e) => debug!("Falling back to text progress: {}", e),
            }
        }
        tokio::spawn(Self::run_text(self.config, total_jobs, events))
    }

    fn build_bar(total_jobs: usize) -> Result<ProgressBar, String> {
        let bar = ProgressBar::new(total_jobs as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
                )
                .map_err(|e| format!("Progress bar template error: {}", e))?
                .progress_chars("##-"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        Ok(bar)
    }

    async fn run_bar(
        bar: ProgressBar,
        config: ProgressConfig,
        mut events: mpsc::Receiver<ProgressEvent>,
    ) {
        let mut failed = 0usize;
        while let Some(event) = events.recv().await {
            bar.set_position(event.completed as u64);
            match &event.outcome {
                JobOutcome::Failed { url, cause, .. } => {
                    failed += 1;
                    bar.println(format!("failed: {} ({})", url, cause));
                }
                outcome => {
                    if let Some(path) = outcome.path() {
                        let name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        bar.set_message(truncate_filename(&name, config.max_filename_width));
                    }
                }
            }
        }

        if failed > 0 {
            bar.abandon_with_message(format!("{} failed", failed));
        } else {
            bar.finish_with_message("done");
        }
    }

    async fn run_text(
        config: ProgressConfig,
        total_jobs: usize,
        mut events: mpsc::Receiver<ProgressEvent>,
    ) {
        eprintln!("Starting download of {} files...", total_jobs);

        let mut last_report = Instant::now();
        let mut bytes = 0u64;
        while let Some(event) = events.recv().await {
            bytes += event.outcome.bytes_written();
            let finished = event.completed == event.total;
            if finished || last_report.elapsed() >= config.text_report_interval {
                eprintln!("{}", text_line(&event, bytes));
                last_report = Instant::now();
            }
        }
    }
}

fn text_line(event: &ProgressEvent, bytes: u64) -> String {
    let percent = if event.total == 0 {
        100.0
    } else {
        event.completed as f64 / event.total as f64 * 100.0
    };
    format!(
        "Progress: {}/{} files ({:.1}%), {} written",
        event.completed,
        event.total,
        percent,
        format_bytes(bytes)
    )
}

/// Shorten a file name to at most `max_width` characters
fn truncate_filename(name: &str, max_width: usize) -> String {
    if name.chars().count() <= max_width || max_width < 4 {
        return name.to_string();
    }
    let keep = max_width - 3;
    let tail: String = name
        .chars()
        .rev()
        .take(keep)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{}", tail)
}
