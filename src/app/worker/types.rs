//! Worker type definitions
//!
//! Outcomes produced by the fetch worker. Every job yields exactly one
//! [`JobOutcome`]; errors never escape the worker.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{DownloadError, FailureKind};

/// Why a job failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureCause {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&DownloadError> for FailureCause {
    fn from(error: &DownloadError) -> Self {
        Self::new(error.failure_kind(), error.to_string())
    }
}

impl std::fmt::Display for FailureCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Result of executing one download job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum JobOutcome {
    /// File written (or, in dry-run mode, would have been written)
    Success {
        url: String,
        path: PathBuf,
        /// Bytes written to disk; 0 in dry-run mode
        bytes: u64,
    },
    /// Destination already existed and skip-existing was set
    Skipped { path: PathBuf },
    /// Job could not be completed
    Failed {
        /// Rendered URL, empty if rendering failed
        url: String,
        cause: FailureCause,
        /// HTTP status when the server answered
        status: Option<u16>,
    },
}

impl JobOutcome {
    /// Build a failed outcome from a download error
    pub fn failed(url: impl Into<String>, error: &DownloadError) -> Self {
        JobOutcome::Failed {
            url: url.into(),
            cause: FailureCause::from(error),
            status: error.status(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, JobOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobOutcome::Failed { .. })
    }

    /// Local path, when one was determined
    pub fn path(&self) -> Option<&Path> {
        match self {
            JobOutcome::Success { path, .. } | JobOutcome::Skipped { path } => Some(path),
            JobOutcome::Failed { .. } => None,
        }
    }

    /// Bytes written by this job
    pub fn bytes_written(&self) -> u64 {
        match self {
            JobOutcome::Success { bytes, .. } => *bytes,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_outcome_from_error() {
        let error = DownloadError::HttpStatus {
            status: 404,
            url: "https://example.com/x.bz2".to_string(),
        };
        let outcome = JobOutcome::failed("https://example.com/x.bz2", &error);

        assert!(outcome.is_failed());
        assert!(outcome.path().is_none());
        match outcome {
            JobOutcome::Failed { cause, status, .. } => {
                assert_eq!(cause.kind, FailureKind::HttpStatus);
                assert_eq!(status, Some(404));
                assert!(cause.message.contains("404"));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = JobOutcome::Skipped {
            path: PathBuf::from("/data/a.grib2"),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["path"], "/data/a.grib2");
        assert_eq!(outcome.bytes_written(), 0);

        let failed = JobOutcome::Failed {
            url: "u".to_string(),
            cause: FailureCause::new(FailureKind::Decompression, "bad data"),
            status: None,
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["cause"]["kind"], "decompression");
    }
}
