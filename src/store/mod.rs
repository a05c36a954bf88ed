use async_trait::async_trait;
use chrono::{DateTime, Utc};
use getset::Getters;
use serde_json::Value;

use crate::errors::Result;
use crate::job::{Job, JobId};
use crate::job_options::JobOptions;
use crate::task::TaskKind;

mod memory;
pub mod migrations;
mod postgres;
mod sql;

pub(crate) const DEFAULT_PRIORITY: i16 = 1;
pub(crate) const DEFAULT_MAX_ATTEMPTS: i16 = 3;

pub use memory::MemoryJobStore;
pub use migrations::MigrateError;
pub use postgres::PgJobStore;

/// Number of jobs in each lifecycle state.
#[derive(sqlx::FromRow, Getters, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[getset(get = "pub")]
pub struct StatusCounts {
    pub(crate) pending: i64,
    pub(crate) processing: i64,
    pub(crate) completed: i64,
    pub(crate) failed: i64,
}

/// Persistence behind the queue.
///
/// The store owns every state transition a job can make, so that workers
/// and schedulers stay free of storage concerns and several of them can
/// share one queue safely. The one invariant implementations must uphold:
/// a PENDING job is handed to exactly one caller of [`claim_batch`], no
/// matter how many workers poll concurrently.
///
/// [`claim_batch`]: JobStore::claim_batch
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new PENDING job.
    ///
    /// When `options.dedup_key` is set and a PENDING or PROCESSING job
    /// already carries the same key, no row is inserted and the existing
    /// job is returned instead. Terminal jobs never block a new insert.
    async fn create_job(&self, task: TaskKind, payload: Value, options: JobOptions)
        -> Result<Job>;

    /// Atomically move up to `limit` runnable jobs to PROCESSING on behalf
    /// of `worker_id` and return them, best priority first.
    ///
    /// A job is runnable when it is PENDING and its `available_at` is not
    /// in the future. Ties on priority go to the oldest job.
    async fn claim_batch(&self, worker_id: &str, limit: usize) -> Result<Vec<Job>>;

    /// Record a successful attempt. The row is kept with its result.
    ///
    /// Fails with [`QueueError::JobNotFound`] when the job is not
    /// PROCESSING anymore, which happens when a stale lock was swept
    /// while a slow worker was still running the job.
    ///
    /// [`QueueError::JobNotFound`]: crate::errors::QueueError::JobNotFound
    async fn mark_completed(&self, id: JobId, result: Option<Value>) -> Result<()>;

    /// Record a final failed attempt and park the job as FAILED.
    /// Increments `attempt_count`, so a job that exhausted its attempts
    /// ends with `attempt_count == max_attempts`.
    async fn mark_failed(&self, id: JobId, error: &str) -> Result<()>;

    /// Record a failed attempt and return the job to PENDING, claimable
    /// again at `available_at`. Increments `attempt_count`.
    async fn reschedule(&self, id: JobId, error: &str, available_at: DateTime<Utc>)
        -> Result<()>;

    async fn get_job(&self, id: JobId) -> Result<Option<Job>>;

    async fn counts(&self) -> Result<StatusCounts>;

    /// Delete terminal jobs that finished before `older_than`. Returns how
    /// many rows went.
    async fn sweep_terminal(&self, older_than: DateTime<Utc>) -> Result<u64>;

    /// Return PROCESSING jobs locked before `locked_before` to PENDING,
    /// e.g. after a worker crashed while holding claims. Returns how many
    /// jobs were released. Does not count an attempt, the job just gets
    /// claimed again.
    async fn unlock_stale(&self, locked_before: DateTime<Utc>) -> Result<u64>;
}
