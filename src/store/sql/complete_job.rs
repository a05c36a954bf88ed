use indoc::formatdoc;
use serde_json::Value;
use sqlx::{query, PgExecutor};

use crate::errors::{QueueError, Result};
use crate::job::JobId;

#[tracing::instrument(skip_all, err, fields(otel.kind = "client", db.system = "postgresql"))]
pub(crate) async fn complete_job(
    executor: impl for<'e> PgExecutor<'e>,
    escaped_schema: &str,
    job_id: JobId,
    result: Option<Value>,
) -> Result<()> {
    let sql = formatdoc!(
        r#"
            update {escaped_schema}.jobs as jobs
                set
                    status = 'COMPLETED',
                    result = $2::jsonb,
                    locked_by = null,
                    locked_at = null,
                    processed_at = now(),
                    updated_at = now()
                where id = $1::uuid and status = 'PROCESSING';
        "#
    );

    let done = query(&sql)
        .bind(job_id)
        .bind(result)
        .execute(executor)
        .await?;
    if done.rows_affected() == 0 {
        return Err(QueueError::JobNotFound(job_id));
    }
    Ok(())
}
