use indoc::formatdoc;
use serde_json::Value;
use sqlx::{query_as, PgExecutor};

use super::job_row::JobRow;
use crate::errors::Result;
use crate::job::{Job, JobId};
use crate::job_options::JobOptions;
use crate::store::{DEFAULT_MAX_ATTEMPTS, DEFAULT_PRIORITY};
use crate::task::TaskKind;

/// Insert one PENDING job, deduplicating on `dedup_key` against live jobs.
///
/// Returns `None` only in the narrow race where the insert conflicted but
/// the conflicting row is not visible to this statement's snapshot yet.
/// Callers retry in that case.
#[tracing::instrument(skip_all, err, fields(otel.kind = "client", db.system = "postgresql"))]
pub(crate) async fn create_job(
    executor: impl for<'e> PgExecutor<'e>,
    escaped_schema: &str,
    task: TaskKind,
    payload: &Value,
    options: &JobOptions,
) -> Result<Option<Job>> {
    let sql = formatdoc!(
        r#"
            with new_job as (
                insert into {escaped_schema}.jobs
                    (id, task, payload, user_id, priority, max_attempts, available_at, dedup_key)
                values
                    ($1::uuid, $2::text, $3::jsonb, $4::uuid, $5::smallint, $6::smallint, $7::timestamptz, $8::text)
                on conflict (dedup_key) where status in ('PENDING', 'PROCESSING') do nothing
                returning *
            )
            select * from new_job
            union all
            select * from {escaped_schema}.jobs
                where dedup_key = $8::text and status in ('PENDING', 'PROCESSING')
            limit 1
        "#
    );

    let now = chrono::Utc::now();
    let row: Option<JobRow> = query_as(&sql)
        .bind(JobId::new_v4())
        .bind(task.as_str())
        .bind(payload)
        .bind(options.user_id())
        .bind(options.priority().unwrap_or(DEFAULT_PRIORITY))
        .bind(options.max_attempts().unwrap_or(DEFAULT_MAX_ATTEMPTS))
        .bind(options.available_from(now))
        .bind(options.dedup_key())
        .fetch_optional(executor)
        .await?;

    row.map(Job::try_from).transpose()
}
