//! The stock task handlers this crate ships.
//!
//! Each handler is a thin shim: deserialize the payload, call out to the
//! [`Services`](crate::Services) collaborators, map failures onto a retry
//! directive and hand back a small outcome struct that is persisted as the
//! job result. Anything resembling business policy lives behind the
//! service traits, not here.

mod analyze;
mod cleanup;
mod scan;

pub use analyze::{AnalysisAction, AnalysisOutcome, AnalyzeJobMatch};
pub use cleanup::{
    CleanupExpiredNotifications, CleanupExpiredReviews, CleanupOldJobs, CleanupOutcome,
    OldJobsCleanupOutcome,
};
pub use scan::{AutomatedJobScan, BatchScanOutcome, ScanOutcome, UserJobScan};

use crate::builder::WorkerOptions;
use crate::handler::TaskError;
use crate::services::ServiceError;

/// Registers every stock handler on the given worker options.
///
/// # Example
/// ```
/// use jobscout::tasks::register_default_tasks;
/// use jobscout::WorkerOptions;
///
/// let options = register_default_tasks(WorkerOptions::default());
/// ```
pub fn register_default_tasks(options: WorkerOptions) -> WorkerOptions {
    options
        .define_task::<UserJobScan>()
        .define_task::<AnalyzeJobMatch>()
        .define_task::<AutomatedJobScan>()
        .define_task::<CleanupExpiredReviews>()
        .define_task::<CleanupExpiredNotifications>()
        .define_task::<CleanupOldJobs>()
}

/// Maps a collaborator failure onto a retry directive.
///
/// A missing row will still be missing on the next attempt. Rate limits
/// and outages might heal, those go through the backoff curve.
pub(crate) fn service_error(error: ServiceError) -> TaskError {
    match error {
        ServiceError::NotFound(_) => TaskError::fatal(error.to_string()),
        _ => TaskError::retry(error.to_string()),
    }
}
