use sqlx::{query, Executor, Postgres, Row};

/// Quote an identifier (e.g. a schema name) so it is safe to interpolate
/// into SQL text. Delegates to PostgreSQL's own `format('%I', ...)`.
pub(crate) async fn escape_identifier<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    identifier: &str,
) -> Result<String, sqlx::Error> {
    let row = query("select format('%I', $1::text) as escaped_identifier")
        .bind(identifier)
        .fetch_one(executor)
        .await?;

    row.try_get("escaped_identifier")
}
