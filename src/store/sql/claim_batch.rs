use indoc::formatdoc;
use sqlx::{query_as, PgExecutor};

use super::job_row::JobRow;
use crate::errors::Result;
use crate::job::Job;

/// Claim up to `limit` runnable jobs for `worker_id` in one statement.
///
/// `for update skip locked` keeps concurrent workers from blocking on or
/// double-claiming the same rows.
pub(crate) async fn claim_batch(
    executor: impl for<'e> PgExecutor<'e>,
    escaped_schema: &str,
    worker_id: &str,
    limit: usize,
) -> Result<Vec<Job>> {
    let sql = formatdoc!(
        r#"
            with runnable as (
                select jobs.id
                    from {escaped_schema}.jobs as jobs
                    where jobs.status = 'PENDING'
                    and jobs.available_at <= now()
                    order by priority desc, created_at asc
                    limit $2::bigint
                    for update
                    skip locked
            )
            update {escaped_schema}.jobs as jobs
                set
                    status = 'PROCESSING',
                    locked_by = $1::text,
                    locked_at = now(),
                    updated_at = now()
                from runnable
                where jobs.id = runnable.id
                returning jobs.*
        "#
    );

    let rows: Vec<JobRow> = query_as(&sql)
        .bind(worker_id)
        .bind(limit as i64)
        .fetch_all(executor)
        .await?;

    let mut jobs = rows
        .into_iter()
        .map(Job::try_from)
        .collect::<Result<Vec<_>>>()?;
    // update .. returning does not preserve the select order
    jobs.sort_by(|a, b| {
        b.priority()
            .cmp(a.priority())
            .then_with(|| a.created_at().cmp(b.created_at()))
    });
    Ok(jobs)
}
