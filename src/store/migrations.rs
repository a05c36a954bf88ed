//! Embedded schema migrations for the PostgreSQL job store.
//!
//! Migrations run inside `PgJobStore::init`, each in its own transaction,
//! and are recorded in a `migrations` table inside the queue schema so
//! several deployments can share a database safely.

use indoc::{formatdoc, indoc};
use sqlx::{query, query_as, Acquire, Error as SqlxError, FromRow, PgExecutor, Postgres, Transaction};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Database is using queue schema revision {latest_migration} which includes breaking migration {latest_breaking_migration}, but this build only supports up to revision {highest_migration}. It would be unsafe to continue; upgrade before restarting the queue.")]
    IncompatibleRevision {
        latest_migration: i32,
        latest_breaking_migration: i32,
        highest_migration: i32,
    },
    #[error("Error occured while migrate: {0}")]
    SqlError(#[from] sqlx::Error),
}

pub(crate) struct JobscoutMigration {
    name: &'static str,
    number: i32,
    is_breaking: bool,
    stmts: &'static [&'static str],
}

impl JobscoutMigration {
    async fn execute(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        escaped_schema: &str,
    ) -> Result<(), sqlx::Error> {
        for stmt in self.stmts {
            let stmt = stmt.replace(":JOBSCOUT_SCHEMA", escaped_schema);
            sqlx::query(&stmt).execute(tx.as_mut()).await?;
        }

        Ok(())
    }
}

pub(crate) const JOBSCOUT_MIGRATIONS: &[JobscoutMigration] = &[
    JobscoutMigration {
        name: "m000001_create_jobs",
        number: 1,
        is_breaking: false,
        stmts: &[
            indoc! {r#"
                create table :JOBSCOUT_SCHEMA.jobs (
                    id uuid primary key,
                    task text not null,
                    payload jsonb not null default '{}'::jsonb,
                    user_id uuid,
                    status text not null default 'PENDING'
                        constraint jobs_status_check
                        check (status in ('PENDING', 'PROCESSING', 'COMPLETED', 'FAILED')),
                    priority smallint not null default 1,
                    attempt_count smallint not null default 0,
                    max_attempts smallint not null default 3,
                    available_at timestamptz not null default now(),
                    dedup_key text,
                    error_message text,
                    result jsonb,
                    locked_by text,
                    locked_at timestamptz,
                    processed_at timestamptz,
                    created_at timestamptz not null default now(),
                    updated_at timestamptz not null default now()
                );
            "#},
            indoc! {r#"
                create index jobs_claim_idx
                    on :JOBSCOUT_SCHEMA.jobs (priority desc, created_at asc)
                    where status = 'PENDING';
            "#},
            indoc! {r#"
                create unique index jobs_live_dedup_key_idx
                    on :JOBSCOUT_SCHEMA.jobs (dedup_key)
                    where status in ('PENDING', 'PROCESSING');
            "#},
        ],
    },
    JobscoutMigration {
        name: "m000002_locked_at_idx",
        number: 2,
        is_breaking: false,
        stmts: &[indoc! {r#"
            create index jobs_locked_at_idx
                on :JOBSCOUT_SCHEMA.jobs (locked_at)
                where status = 'PROCESSING';
        "#}],
    },
];

/// Installs the queue schema and its migrations table.
async fn install_schema<'e, E>(executor: E, escaped_schema: &str) -> Result<(), MigrateError>
where
    E: PgExecutor<'e> + Acquire<'e, Database = Postgres> + Clone,
{
    info!("Installing jobscout queue schema");

    let create_schema_query = formatdoc!(
        r#"
            create schema if not exists {escaped_schema};
        "#
    );

    let create_migration_table_query = formatdoc!(
        r#"
            create table {escaped_schema}.migrations (
                id int primary key,
                ts timestamptz default now() not null,
                breaking boolean not null default false
            );
        "#
    );

    let mut tx = executor.begin().await?;
    query(&create_schema_query).execute(tx.as_mut()).await?;
    query(&create_migration_table_query)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    Ok(())
}

#[derive(FromRow, Default)]
struct LastMigration {
    id: Option<i32>,
    biggest_breaking_id: Option<i32>,
}

impl LastMigration {
    fn is_before_number(&self, migration_number: i32) -> bool {
        self.id.map_or(true, |id| migration_number > id)
    }
}

/// Returns the last migration that was run against the database, installing
/// the schema first when this is a fresh database.
async fn get_last_migration<'e, E>(
    executor: &E,
    escaped_schema: &str,
) -> Result<LastMigration, MigrateError>
where
    E: PgExecutor<'e> + Acquire<'e, Database = Postgres> + Send + Sync + Clone,
{
    let migrations_status_query = formatdoc!(
        r#"
            select
                (select id from {escaped_schema}.migrations order by id desc limit 1) as id,
                (select id from {escaped_schema}.migrations where breaking is true order by id desc limit 1) as biggest_breaking_id;
        "#
    );

    let last_migration = query_as::<_, LastMigration>(&migrations_status_query)
        .fetch_one(executor.clone())
        .await;
    match last_migration {
        Ok(row) => Ok(row),
        // 42P01: the migrations table does not exist yet
        Err(SqlxError::Database(e)) if e.code().as_deref() == Some("42P01") => {
            install_schema(executor.clone(), escaped_schema).await?;
            Ok(Default::default())
        }
        Err(e) => Err(MigrateError::SqlError(e)),
    }
}

/// Runs the migrations against the database.
pub async fn migrate<'e, E>(executor: E, escaped_schema: &str) -> Result<(), MigrateError>
where
    E: PgExecutor<'e> + Acquire<'e, Database = Postgres> + Send + Sync + Clone,
{
    let last_migration = get_last_migration(&executor, escaped_schema).await?;
    let latest_migration = last_migration.id;
    let latest_breaking_migration = last_migration.biggest_breaking_id;

    let mut highest_migration = 0;
    let mut migrated = false;
    for migration in JOBSCOUT_MIGRATIONS {
        if migration.number > highest_migration {
            highest_migration = migration.number;
        }

        if last_migration.is_before_number(migration.number) {
            migrated = true;
            info!(
                migration_number = migration.number,
                migration_name = migration.name,
                is_breaking_migration = migration.is_breaking,
                "Running {} migration {}",
                if migration.is_breaking {
                    "breaking"
                } else {
                    "backwards-compatible"
                },
                migration.name,
            );
            let mut tx = executor.clone().begin().await?;
            migration.execute(&mut tx, escaped_schema).await?;
            let sql =
                format!("insert into {escaped_schema}.migrations (id, breaking) values ($1, $2)");
            query(&sql)
                .bind(migration.number)
                .bind(migration.is_breaking)
                .execute(tx.as_mut())
                .await?;

            tx.commit().await?;
        }
    }

    if migrated {
        info!("Migrations complete");
    }

    if let Some(latest_breaking_migration) = latest_breaking_migration {
        if highest_migration < latest_breaking_migration {
            return Err(MigrateError::IncompatibleRevision {
                latest_migration: latest_migration.unwrap_or(0),
                latest_breaking_migration,
                highest_migration,
            });
        }
    }

    if let Some(latest_migration) = latest_migration {
        if highest_migration < latest_migration {
            warn!(
                latest_migration,
                highest_migration,
                "Database queue schema revision {} is newer than this build supports ({}), attempting to continue",
                latest_migration,
                highest_migration,
            );
        }
    }

    Ok(())
}
