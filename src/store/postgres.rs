use async_trait::async_trait;
use chrono::{DateTime, Utc};
use getset::Getters;
use serde_json::Value;
use sqlx::PgPool;

use super::migrations::{migrate, MigrateError};
use super::sql;
use super::{JobStore, StatusCounts};
use crate::errors::{QueueError, Result};
use crate::job::{Job, JobId};
use crate::job_options::JobOptions;
use crate::task::TaskKind;
use crate::utils::escape_identifier;

/// PostgreSQL-backed [`JobStore`].
///
/// All state transitions are single statements, so any number of workers
/// and schedulers can share one queue without coordination beyond the
/// database itself.
#[derive(Getters, Clone, Debug)]
#[getset(get = "pub")]
pub struct PgJobStore {
    pg_pool: PgPool,
    escaped_schema: String,
}

impl PgJobStore {
    /// Escape the schema name, run pending migrations and return a ready
    /// store.
    pub async fn init(pg_pool: PgPool, schema: &str) -> std::result::Result<Self, MigrateError> {
        let escaped_schema = escape_identifier(&pg_pool, schema).await?;
        migrate(&pg_pool, &escaped_schema).await?;
        Ok(Self {
            pg_pool,
            escaped_schema,
        })
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(
        &self,
        task: TaskKind,
        payload: Value,
        options: JobOptions,
    ) -> Result<Job> {
        // Two passes cover the race where the insert conflicts on the
        // dedup key but the winning row is not in our snapshot yet.
        for _ in 0..2 {
            let created = sql::create_job::create_job(
                &self.pg_pool,
                &self.escaped_schema,
                task,
                &payload,
                &options,
            )
            .await?;
            if let Some(job) = created {
                return Ok(job);
            }
        }
        Err(QueueError::SqlError(sqlx::Error::RowNotFound))
    }

    async fn claim_batch(&self, worker_id: &str, limit: usize) -> Result<Vec<Job>> {
        sql::claim_batch::claim_batch(&self.pg_pool, &self.escaped_schema, worker_id, limit).await
    }

    async fn mark_completed(&self, id: JobId, result: Option<Value>) -> Result<()> {
        sql::complete_job::complete_job(&self.pg_pool, &self.escaped_schema, id, result).await
    }

    async fn mark_failed(&self, id: JobId, error: &str) -> Result<()> {
        sql::fail_job::fail_job(&self.pg_pool, &self.escaped_schema, id, error).await
    }

    async fn reschedule(
        &self,
        id: JobId,
        error: &str,
        available_at: DateTime<Utc>,
    ) -> Result<()> {
        sql::fail_job::reschedule_job(&self.pg_pool, &self.escaped_schema, id, error, available_at)
            .await
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let query = format!(
            "select * from {}.jobs where id = $1::uuid",
            self.escaped_schema
        );
        let row: Option<sql::job_row::JobRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pg_pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    async fn counts(&self) -> Result<StatusCounts> {
        sql::queue_stats::queue_stats(&self.pg_pool, &self.escaped_schema).await
    }

    async fn sweep_terminal(&self, older_than: DateTime<Utc>) -> Result<u64> {
        sql::maintenance::sweep_terminal_jobs(&self.pg_pool, &self.escaped_schema, older_than)
            .await
    }

    async fn unlock_stale(&self, locked_before: DateTime<Utc>) -> Result<u64> {
        sql::maintenance::unlock_stale_jobs(&self.pg_pool, &self.escaped_schema, locked_before)
            .await
    }
}
