use chrono::{DateTime, Utc};
use indoc::formatdoc;
use sqlx::{query, PgExecutor};

use crate::errors::{QueueError, Result};
use crate::job::JobId;

/// Park a job as FAILED for good, recording the final failed attempt.
pub(crate) async fn fail_job(
    executor: impl for<'e> PgExecutor<'e>,
    escaped_schema: &str,
    job_id: JobId,
    message: &str,
) -> Result<()> {
    let sql = formatdoc!(
        r#"
            update {escaped_schema}.jobs as jobs
                set
                    status = 'FAILED',
                    attempt_count = jobs.attempt_count + 1,
                    error_message = $2::text,
                    locked_by = null,
                    locked_at = null,
                    processed_at = now(),
                    updated_at = now()
                where id = $1::uuid and status = 'PROCESSING';
        "#
    );

    let done = query(&sql)
        .bind(job_id)
        .bind(message)
        .execute(executor)
        .await?;
    if done.rows_affected() == 0 {
        return Err(QueueError::JobNotFound(job_id));
    }
    Ok(())
}

/// Record a failed attempt and return the job to PENDING for a later retry.
pub(crate) async fn reschedule_job(
    executor: impl for<'e> PgExecutor<'e>,
    escaped_schema: &str,
    job_id: JobId,
    message: &str,
    available_at: DateTime<Utc>,
) -> Result<()> {
    let sql = formatdoc!(
        r#"
            update {escaped_schema}.jobs as jobs
                set
                    status = 'PENDING',
                    attempt_count = jobs.attempt_count + 1,
                    error_message = $2::text,
                    available_at = $3::timestamptz,
                    locked_by = null,
                    locked_at = null,
                    updated_at = now()
                where id = $1::uuid and status = 'PROCESSING';
        "#
    );

    let done = query(&sql)
        .bind(job_id)
        .bind(message)
        .bind(available_at)
        .execute(executor)
        .await?;
    if done.rows_affected() == 0 {
        return Err(QueueError::JobNotFound(job_id));
    }
    Ok(())
}
