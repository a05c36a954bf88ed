use indoc::formatdoc;
use sqlx::{query_as, PgExecutor};

use crate::errors::Result;
use crate::store::StatusCounts;

pub(crate) async fn queue_stats(
    executor: impl for<'e> PgExecutor<'e>,
    escaped_schema: &str,
) -> Result<StatusCounts> {
    let sql = formatdoc!(
        r#"
            select
                count(*) filter (where status = 'PENDING') as pending,
                count(*) filter (where status = 'PROCESSING') as processing,
                count(*) filter (where status = 'COMPLETED') as completed,
                count(*) filter (where status = 'FAILED') as failed
            from {escaped_schema}.jobs
        "#
    );

    let counts = query_as(&sql).fetch_one(executor).await?;
    Ok(counts)
}
