//! Batch results and progress events
//!
//! The orchestrator is the only writer of a [`BatchResult`]: outcomes arrive
//! over a channel in completion order and are folded in by a
//! [`BatchAccumulator`]. Once returned, the result is immutable.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::worker::JobOutcome;
use crate::constants::exit;

/// Aggregate result of one batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Jobs submitted
    pub total_jobs: usize,
    /// Jobs that wrote (or in dry-run would write) a file
    pub succeeded: usize,
    /// Jobs skipped because the file already existed
    pub skipped: usize,
    /// Failed outcomes in completion order
    pub failures: Vec<JobOutcome>,
    /// Successful and skipped outcomes in completion order
    pub completed: Vec<JobOutcome>,
    /// Jobs never started because the batch was cancelled
    pub abandoned: usize,
    /// Bytes written to disk
    pub bytes_written: u64,
    /// Wall time of the batch
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
}

impl BatchResult {
    /// Result of a batch without jobs
    pub fn empty() -> Self {
        Self {
            total_jobs: 0,
            succeeded: 0,
            skipped: 0,
            failures: Vec::new(),
            completed: Vec::new(),
            abandoned: 0,
            bytes_written: 0,
            duration: Duration::ZERO,
        }
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Jobs that produced an outcome
    pub fn processed(&self) -> usize {
        self.succeeded + self.skipped + self.failed()
    }

    /// True when nothing failed and nothing was abandoned
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && self.abandoned == 0
    }

    /// Process exit status: the failure count, capped to what every platform keeps
    pub fn exit_code(&self) -> i32 {
        self.failed().min(exit::MAX_FAILURE_EXIT_CODE as usize) as i32
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} jobs: {} downloaded, {} skipped, {} failed",
            self.total_jobs,
            self.succeeded,
            self.skipped,
            self.failed()
        );
        if self.abandoned > 0 {
            summary.push_str(&format!(", {} abandoned", self.abandoned));
        }
        summary.push_str(&format!(
            " ({} in {})",
            format_bytes(self.bytes_written),
            format_duration(self.duration)
        ));
        summary
    }
}

/// Event sent to an optional progress listener, one per outcome
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// Outcomes received so far, including this one
    pub completed: usize,
    /// Jobs in the batch
    pub total: usize,
    pub outcome: JobOutcome,
}

/// Folds outcomes into a `BatchResult`
#[derive(Debug)]
pub(crate) struct BatchAccumulator {
    result: BatchResult,
}

impl BatchAccumulator {
    pub(crate) fn new(total_jobs: usize) -> Self {
        Self {
            result: BatchResult {
                total_jobs,
                ..BatchResult::empty()
            },
        }
    }

    pub(crate) fn record(&mut self, outcome: JobOutcome) {
        self.result.bytes_written += outcome.bytes_written();
        match outcome {
            JobOutcome::Success { .. } => {
                self.result.succeeded += 1;
                self.result.completed.push(outcome);
            }
            JobOutcome::Skipped { .. } => {
                self.result.skipped += 1;
                self.result.completed.push(outcome);
            }
            JobOutcome::Failed { .. } => self.result.failures.push(outcome),
        }
    }

    pub(crate) fn recorded(&self) -> usize {
        self.result.processed()
    }

    /// Close the batch; jobs without an outcome count as abandoned
    pub(crate) fn finish(mut self, duration: Duration) -> BatchResult {
        self.result.abandoned = self.result.total_jobs.saturating_sub(self.recorded());
        self.result.duration = duration;
        self.result
    }
}

/// Format a byte count as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    let bytes = bytes as f64;
    if bytes < 1024.0 {
        format!("{} B", bytes)
    } else if bytes < 1024.0 * 1024.0 {
        format!("{:.1} KB", bytes / 1024.0)
    } else if bytes < 1024.0 * 1024.0 * 1024.0 {
        format!("{:.1} MB", bytes / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if total_secs < 3600 {
        format!("{}m{}s", total_secs / 60, total_secs % 60)
    } else {
        format!("{}h{}m", total_secs / 3600, (total_secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::worker::FailureCause;
    use crate::errors::FailureKind;
    use std::path::PathBuf;

    fn success(bytes: u64) -> JobOutcome {
        JobOutcome::Success {
            url: "u".to_string(),
            path: PathBuf::from("p"),
            bytes,
        }
    }

    fn failure(n: u16) -> JobOutcome {
        JobOutcome::Failed {
            url: format!("u{}", n),
            cause: FailureCause::new(FailureKind::HttpStatus, "not found"),
            status: Some(n),
        }
    }

    /// Test outcome accumulation
    ///
    /// Verifies counts, byte totals and that failures keep completion order
    #[test]
    fn test_accumulator_counts() {
        let mut acc = BatchAccumulator::new(5);
        acc.record(success(100));
        acc.record(failure(404));
        acc.record(JobOutcome::Skipped {
            path: PathBuf::from("s"),
        });
        acc.record(failure(500));
        acc.record(success(50));

        let result = acc.finish(Duration::from_secs(2));
        assert_eq!(result.total_jobs, 5);
        assert_eq!(result.succeeded, 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.failed(), 2);
        assert_eq!(result.completed.len(), 3);
        assert_eq!(result.bytes_written, 150);
        assert_eq!(result.abandoned, 0);
        assert_eq!(result.processed(), 5);
        assert!(!result.is_success());
        assert_eq!(result.exit_code(), 2);

        let statuses: Vec<_> = result
            .failures
            .iter()
            .map(|f| match f {
                JobOutcome::Failed { status, .. } => status.unwrap(),
                _ => 0,
            })
            .collect();
        assert_eq!(statuses, vec![404, 500]);
    }

    #[test]
    fn test_abandoned_jobs() {
        let mut acc = BatchAccumulator::new(10);
        acc.record(success(1));
        let result = acc.finish(Duration::ZERO);
        assert_eq!(result.abandoned, 9);
        assert!(!result.is_success());
        assert_eq!(result.exit_code(), 0);
        assert!(result.summary().contains("9 abandoned"));
    }

    #[test]
    fn test_exit_code_is_capped() {
        let mut acc = BatchAccumulator::new(300);
        for _ in 0..300 {
            acc.record(failure(503));
        }
        let result = acc.finish(Duration::ZERO);
        assert_eq!(result.exit_code(), 254);
        assert!(result.exit_code() < crate::constants::exit::FATAL_EXIT_CODE);
    }

    #[test]
    fn test_formatting() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h1m");

        let summary = BatchResult::empty().summary();
        assert!(summary.starts_with("0 jobs: 0 downloaded"));
    }

    #[test]
    fn test_report_serialization() {
        let mut acc = BatchAccumulator::new(1);
        acc.record(failure(404));
        let result = acc.finish(Duration::from_secs(3));

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["total_jobs"], 1);
        assert_eq!(json["duration"], "3s");
        assert_eq!(json["failures"][0]["status"], 404);
    }
}
