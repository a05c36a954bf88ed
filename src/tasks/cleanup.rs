use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::TaskContext;
use crate::handler::{IntoTaskResult, TaskError, TaskHandler};
use crate::task::TaskKind;
use crate::tasks::service_error;

/// Saved listings older than this many days are swept when the payload
/// does not pick a window.
const DEFAULT_RETENTION_DAYS: u32 = 90;

fn default_retention_days() -> u32 {
    DEFAULT_RETENTION_DAYS
}

/// How many rows one sweep removed, persisted as the job result.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOutcome {
    pub removed: u64,
}

/// Delete match reviews whose expiry has passed.
///
/// The sweep only ever touches already-expired rows, so running it twice,
/// or concurrently with itself, removes each row once.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupExpiredReviews {}

impl TaskHandler for CleanupExpiredReviews {
    const KIND: TaskKind = TaskKind::CleanupExpiredReviews;

    async fn run(self, ctx: TaskContext) -> impl IntoTaskResult {
        sweep_reviews(&ctx).await
    }
}

async fn sweep_reviews(ctx: &TaskContext) -> Result<CleanupOutcome, TaskError> {
    let removed = ctx
        .services()
        .domain
        .delete_expired_reviews(Utc::now())
        .await
        .map_err(service_error)?;

    info!(removed, "Expired reviews swept");
    Ok(CleanupOutcome { removed })
}

/// Delete notifications whose expiry has passed.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupExpiredNotifications {}

impl TaskHandler for CleanupExpiredNotifications {
    const KIND: TaskKind = TaskKind::CleanupExpiredNotifications;

    async fn run(self, ctx: TaskContext) -> impl IntoTaskResult {
        sweep_notifications(&ctx).await
    }
}

async fn sweep_notifications(ctx: &TaskContext) -> Result<CleanupOutcome, TaskError> {
    let removed = ctx
        .services()
        .domain
        .delete_expired_notifications(Utc::now())
        .await
        .map_err(service_error)?;

    info!(removed, "Expired notifications swept");
    Ok(CleanupOutcome { removed })
}

/// Delete saved listings older than the retention window, and terminal
/// queue jobs along with them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CleanupOldJobs {
    /// Listings and finished queue jobs older than this many days go
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for CleanupOldJobs {
    fn default() -> Self {
        CleanupOldJobs {
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

/// Outcome of the old-jobs sweep, persisted as the job result.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OldJobsCleanupOutcome {
    pub listings_removed: u64,
    pub queue_jobs_removed: u64,
}

impl TaskHandler for CleanupOldJobs {
    const KIND: TaskKind = TaskKind::CleanupOldJobs;

    async fn run(self, ctx: TaskContext) -> impl IntoTaskResult {
        sweep_old_jobs(&ctx, self.retention_days).await
    }
}

async fn sweep_old_jobs(
    ctx: &TaskContext,
    retention_days: u32,
) -> Result<OldJobsCleanupOutcome, TaskError> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);

    let listings_removed = ctx
        .services()
        .domain
        .delete_old_listings(cutoff)
        .await
        .map_err(service_error)?;

    let queue_jobs_removed = ctx
        .client()
        .sweep_terminal(cutoff)
        .await
        .map_err(|e| TaskError::retry(e.to_string()))?;

    info!(
        listings_removed,
        queue_jobs_removed, retention_days, "Old jobs swept"
    );
    Ok(OldJobsCleanupOutcome {
        listings_removed,
        queue_jobs_removed,
    })
}
