use chrono::prelude::*;
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::QueueError;
use crate::job::Job;

/// A job exactly as it comes back from PostgreSQL, before the textual
/// `task` and `status` columns are parsed into their enums.
#[derive(FromRow, Debug)]
pub(crate) struct JobRow {
    id: Uuid,
    task: String,
    payload: Value,
    user_id: Option<Uuid>,
    status: String,
    priority: i16,
    attempt_count: i16,
    max_attempts: i16,
    available_at: DateTime<Utc>,
    dedup_key: Option<String>,
    error_message: Option<String>,
    result: Option<Value>,
    locked_by: Option<String>,
    locked_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = QueueError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        Ok(Job {
            id: row.id,
            task: row.task.parse()?,
            payload: row.payload,
            user_id: row.user_id,
            status: row.status.parse()?,
            priority: row.priority,
            attempt_count: row.attempt_count,
            max_attempts: row.max_attempts,
            available_at: row.available_at,
            dedup_key: row.dedup_key,
            error_message: row.error_message,
            result: row.result,
            locked_by: row.locked_by,
            locked_at: row.locked_at,
            processed_at: row.processed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
