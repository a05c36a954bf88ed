use chrono::{DateTime, Utc};
use indoc::formatdoc;
use sqlx::{query, PgExecutor};

use crate::errors::Result;

/// Delete COMPLETED and FAILED jobs that finished before the cutoff.
pub(crate) async fn sweep_terminal_jobs(
    executor: impl for<'e> PgExecutor<'e>,
    escaped_schema: &str,
    older_than: DateTime<Utc>,
) -> Result<u64> {
    let sql = formatdoc!(
        r#"
            delete from {escaped_schema}.jobs
                where status in ('COMPLETED', 'FAILED')
                and coalesce(processed_at, updated_at) < $1::timestamptz;
        "#
    );

    let done = query(&sql).bind(older_than).execute(executor).await?;
    Ok(done.rows_affected())
}

/// Return PROCESSING jobs whose lock predates the cutoff to PENDING,
/// e.g. claims held by a worker that crashed.
pub(crate) async fn unlock_stale_jobs(
    executor: impl for<'e> PgExecutor<'e>,
    escaped_schema: &str,
    locked_before: DateTime<Utc>,
) -> Result<u64> {
    let sql = formatdoc!(
        r#"
            update {escaped_schema}.jobs as jobs
                set
                    status = 'PENDING',
                    locked_by = null,
                    locked_at = null,
                    updated_at = now()
                where status = 'PROCESSING' and locked_at < $1::timestamptz;
        "#
    );

    let done = query(&sql).bind(locked_before).execute(executor).await?;
    Ok(done.rows_affected())
}
