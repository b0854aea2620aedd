//! Configuration structures for the download orchestrator
//!
//! This module defines the options for running a batch: how many fetch workers
//! to run and how outcome and progress events are buffered.

use serde::{Deserialize, Serialize};

use crate::constants::workers;
use crate::errors::{RequestError, RequestResult};

/// Configuration for the download orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Maximum number of concurrent fetch workers
    pub concurrency: usize,
    /// Buffer size of the outcome and progress channels
    pub channel_buffer: usize,
    /// Enable the progress bar when attached to a terminal
    pub enable_progress_bar: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency: workers::DEFAULT_WORKER_COUNT,
            channel_buffer: workers::CHANNEL_BUFFER_SIZE,
            enable_progress_bar: true,
        }
    }
}

impl OrchestratorConfig {
    /// Set the number of concurrent workers
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Enable or disable the progress bar
    pub fn with_progress_bar(mut self, enabled: bool) -> Self {
        self.enable_progress_bar = enabled;
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `RequestError::InvalidConcurrency` when no worker may run
    pub fn validate(&self) -> RequestResult<()> {
        if self.concurrency == 0 {
            return Err(RequestError::InvalidConcurrency {
                value: self.concurrency,
            });
        }
        Ok(())
    }

    /// Channel capacity, never zero
    pub(crate) fn buffer(&self) -> usize {
        self.channel_buffer.max(1)
    }
}
