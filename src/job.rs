use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use getset::Getters;
use serde_json::Value;
use uuid::Uuid;

use crate::errors::QueueError;
use crate::task::TaskKind;

/// Unique identifier of a queued job.
pub type JobId = Uuid;

/// Lifecycle state of a job.
///
/// ```text
///             claim            success
/// PENDING ──────────► PROCESSING ──────► COMPLETED
///    ▲                    │
///    └────────────────────┤ failure, attempts left
///       reschedule        │
///                         └──────► FAILED (attempts exhausted or fatal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// The status value as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "PENDING",
            JobStatus::Processing => "PROCESSING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Failed => "FAILED",
        }
    }

    /// Whether the job has reached a state it will never leave on its own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(JobStatus::Pending),
            "PROCESSING" => Ok(JobStatus::Processing),
            "COMPLETED" => Ok(JobStatus::Completed),
            "FAILED" => Ok(JobStatus::Failed),
            other => Err(QueueError::UnknownJobStatus(other.to_string())),
        }
    }
}

/// A job as the queue sees it.
///
/// Completed and failed rows are retained with their `result` or
/// `error_message` so the application can show job history to the user.
#[derive(Getters, Debug, Clone, PartialEq, Eq)]
#[getset(get = "pub")]
pub struct Job {
    /// Unique identifier of the job
    pub(crate) id: JobId,
    /// Which handler consumes this job
    pub(crate) task: TaskKind,
    /// Handler input, stored as JSON
    pub(crate) payload: Value,
    /// Owning user, when the job acts on behalf of one
    pub(crate) user_id: Option<Uuid>,
    /// Current lifecycle state
    pub(crate) status: JobStatus,
    /// Claim preference, higher claims sooner
    pub(crate) priority: i16,
    /// Attempts recorded so far, failures only
    pub(crate) attempt_count: i16,
    /// Attempts after which the job fails for good
    pub(crate) max_attempts: i16,
    /// Earliest time the job may be claimed
    pub(crate) available_at: DateTime<Utc>,
    /// Key collapsing duplicate live jobs into one
    pub(crate) dedup_key: Option<String>,
    /// Message from the most recent failed attempt
    pub(crate) error_message: Option<String>,
    /// Value returned by the handler on success
    pub(crate) result: Option<Value>,
    /// Worker currently holding the lease
    pub(crate) locked_by: Option<String>,
    /// When the lease was taken
    pub(crate) locked_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state
    pub(crate) processed_at: Option<DateTime<Utc>>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl Job {
    /// Whether this job may still be claimed at `now`.
    pub fn is_runnable(&self, now: &DateTime<Utc>) -> bool {
        self.status == JobStatus::Pending && self.available_at <= *now
    }
}
