use getset::Getters;
use serde::Serialize;

use crate::store::StatusCounts;

/// A queue with this many failed jobs is reported unhealthy.
pub(crate) const UNHEALTHY_FAILED_THRESHOLD: i64 = 100;
/// A queue with this many jobs processing at once is reported unhealthy.
pub(crate) const UNHEALTHY_PROCESSING_THRESHOLD: i64 = 50;

/// Point-in-time snapshot of queue state, suitable for a health endpoint.
#[derive(Getters, Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[getset(get = "pub")]
pub struct QueueMetrics {
    pending: i64,
    processing: i64,
    completed: i64,
    failed: i64,
    /// Worker loops currently running against this queue handle
    workers: usize,
}

impl QueueMetrics {
    pub(crate) fn from_counts(counts: StatusCounts, workers: usize) -> Self {
        Self {
            pending: *counts.pending(),
            processing: *counts.processing(),
            completed: *counts.completed(),
            failed: *counts.failed(),
            workers,
        }
    }

    /// False when failures have piled up or claims are outpacing completion.
    pub fn is_healthy(&self) -> bool {
        self.failed < UNHEALTHY_FAILED_THRESHOLD
            && self.processing < UNHEALTHY_PROCESSING_THRESHOLD
    }
}
