use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::types::{ChecksumAlgorithm, UnverifiedPolicy};

pub const DEFAULT_WORKERS: usize = 16;

/// Tunables for one [`Pipeline`](crate::Pipeline) run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of concurrent sync workers.
    pub workers: usize,
    /// Capacity of the work queue and the results channel. `0` means
    /// "same as `workers`".
    pub queue_depth: usize,
    pub checksum: ChecksumAlgorithm,
    /// Whether resume input re-queues `ok,false` records.
    pub unverified: UnverifiedPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            workers: DEFAULT_WORKERS,
            queue_depth: 0,
            checksum: ChecksumAlgorithm::default(),
            unverified: UnverifiedPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn effective_queue_depth(&self) -> usize {
        if self.queue_depth == 0 {
            self.workers
        } else {
            self.queue_depth
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(SyncError::InvalidArgument(
                "worker count must be at least 1".into(),
            ));
        }
        if self.queue_depth != 0 && self.queue_depth < self.workers {
            return Err(SyncError::InvalidArgument(format!(
                "queue depth {} is smaller than worker count {}",
                self.queue_depth, self.workers
            )));
        }
        Ok(())
    }
}
