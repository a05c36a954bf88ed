use thiserror::Error;

use crate::job::JobId;

/// Errors that can occur during queue operations.
///
/// This enum represents the various errors that can occur when interacting
/// with the job store or serializing job payloads.
#[derive(Error, Debug)]
pub enum QueueError {
    /// An error occurred while executing an SQL query
    #[error("Error occured while query: {0}")]
    SqlError(#[from] sqlx::Error),

    /// An error occurred while serializing or deserializing JSON data
    #[error("Error while serializing params: {0}")]
    JsonSerializeError(#[from] serde_json::Error),

    /// A task identifier that no handler is registered under
    #[error("Unknown task identifier: '{0}'")]
    UnknownTaskKind(String),

    /// A status value outside the job state machine was read back from the store
    #[error("Unknown job status: '{0}'")]
    UnknownJobStatus(String),

    /// A release operation targeted a job that is missing or not in the expected state
    #[error("Job '{0}' not found or not in the expected state")]
    JobNotFound(JobId),
}

/// A Result type alias for QueueError.
///
/// This type alias simplifies the return types for functions that can
/// return a QueueError.
pub type Result<T> = core::result::Result<T, QueueError>;
