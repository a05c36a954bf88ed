use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{JobStore, StatusCounts, DEFAULT_MAX_ATTEMPTS, DEFAULT_PRIORITY};
use crate::errors::{QueueError, Result};
use crate::job::{Job, JobId, JobStatus};
use crate::job_options::JobOptions;
use crate::task::TaskKind;

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    /// dedup_key -> id of the live (PENDING or PROCESSING) job holding it
    dedup: HashMap<String, JobId>,
}

/// In-memory [`JobStore`] used by the test suite and available for
/// single-process deployments that do not want a database.
///
/// All operations take one mutex, which gives the same claim atomicity
/// the PostgreSQL store gets from row locks.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("job store mutex poisoned")
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(
        &self,
        task: TaskKind,
        payload: Value,
        options: JobOptions,
    ) -> Result<Job> {
        let mut inner = self.lock();
        let now = Utc::now();

        if let Some(key) = options.dedup_key() {
            if let Some(existing_id) = inner.dedup.get(key) {
                let existing = inner
                    .jobs
                    .get(existing_id)
                    .expect("dedup entry points at a missing job");
                return Ok(existing.clone());
            }
        }

        let job = Job {
            id: JobId::new_v4(),
            task,
            payload,
            user_id: *options.user_id(),
            status: JobStatus::Pending,
            priority: options.priority().unwrap_or(DEFAULT_PRIORITY),
            attempt_count: 0,
            max_attempts: options.max_attempts().unwrap_or(DEFAULT_MAX_ATTEMPTS),
            available_at: options.available_from(now),
            dedup_key: options.dedup_key().clone(),
            error_message: None,
            result: None,
            locked_by: None,
            locked_at: None,
            processed_at: None,
            created_at: now,
            updated_at: now,
        };

        if let Some(key) = job.dedup_key.clone() {
            inner.dedup.insert(key, job.id);
        }
        inner.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn claim_batch(&self, worker_id: &str, limit: usize) -> Result<Vec<Job>> {
        let mut inner = self.lock();
        let now = Utc::now();

        let mut runnable: Vec<JobId> = inner
            .jobs
            .values()
            .filter(|job| job.is_runnable(&now))
            .map(|job| job.id)
            .collect();
        runnable.sort_by(|a, b| {
            let a = &inner.jobs[a];
            let b = &inner.jobs[b];
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        runnable.truncate(limit);

        let mut claimed = Vec::with_capacity(runnable.len());
        for id in runnable {
            let job = inner.jobs.get_mut(&id).expect("claimed id is present");
            job.status = JobStatus::Processing;
            job.locked_by = Some(worker_id.to_string());
            job.locked_at = Some(now);
            job.updated_at = now;
            claimed.push(job.clone());
        }
        Ok(claimed)
    }

    async fn mark_completed(&self, id: JobId, result: Option<Value>) -> Result<()> {
        let mut inner = self.lock();
        let now = Utc::now();
        let job = inner
            .jobs
            .get_mut(&id)
            .filter(|job| job.status == JobStatus::Processing)
            .ok_or(QueueError::JobNotFound(id))?;

        job.status = JobStatus::Completed;
        job.result = result;
        job.locked_by = None;
        job.locked_at = None;
        job.processed_at = Some(now);
        job.updated_at = now;

        let dedup_key = job.dedup_key.clone();
        if let Some(key) = dedup_key {
            inner.dedup.remove(&key);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: JobId, error: &str) -> Result<()> {
        let mut inner = self.lock();
        let now = Utc::now();
        let job = inner
            .jobs
            .get_mut(&id)
            .filter(|job| job.status == JobStatus::Processing)
            .ok_or(QueueError::JobNotFound(id))?;

        job.status = JobStatus::Failed;
        job.attempt_count = job.attempt_count.saturating_add(1);
        job.error_message = Some(error.to_string());
        job.locked_by = None;
        job.locked_at = None;
        job.processed_at = Some(now);
        job.updated_at = now;

        let dedup_key = job.dedup_key.clone();
        if let Some(key) = dedup_key {
            inner.dedup.remove(&key);
        }
        Ok(())
    }

    async fn reschedule(
        &self,
        id: JobId,
        error: &str,
        available_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let job = inner
            .jobs
            .get_mut(&id)
            .filter(|job| job.status == JobStatus::Processing)
            .ok_or(QueueError::JobNotFound(id))?;

        job.status = JobStatus::Pending;
        job.attempt_count = job.attempt_count.saturating_add(1);
        job.error_message = Some(error.to_string());
        job.available_at = available_at;
        job.locked_by = None;
        job.locked_at = None;
        job.updated_at = Utc::now();
        Ok(())
    }

    async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        Ok(self.lock().jobs.get(&id).cloned())
    }

    async fn counts(&self) -> Result<StatusCounts> {
        let inner = self.lock();
        let mut counts = StatusCounts::default();
        for job in inner.jobs.values() {
            match job.status {
                JobStatus::Pending => counts.pending += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }

    async fn sweep_terminal(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.lock();
        let before = inner.jobs.len();
        inner.jobs.retain(|_, job| {
            let finished_at = job.processed_at.unwrap_or(job.updated_at);
            !(job.status.is_terminal() && finished_at < older_than)
        });
        Ok((before - inner.jobs.len()) as u64)
    }

    async fn unlock_stale(&self, locked_before: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.lock();
        let now = Utc::now();
        let mut released = 0;
        for job in inner.jobs.values_mut() {
            let stale = job.status == JobStatus::Processing
                && job.locked_at.is_some_and(|at| at < locked_before);
            if stale {
                job.status = JobStatus::Pending;
                job.locked_by = None;
                job.locked_at = None;
                job.updated_at = now;
                released += 1;
            }
        }
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options() -> JobOptions {
        JobOptions::default()
    }

    #[tokio::test]
    async fn create_then_claim_marks_processing() {
        let store = MemoryJobStore::new();
        let job = store
            .create_job(TaskKind::UserJobScan, json!({"user_id": "u1"}), options())
            .await
            .unwrap();
        assert_eq!(job.status(), &JobStatus::Pending);
        assert_eq!(job.priority(), &1);
        assert_eq!(job.max_attempts(), &3);

        let claimed = store.claim_batch("w1", 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].id(), job.id());
        assert_eq!(claimed[0].status(), &JobStatus::Processing);
        assert_eq!(claimed[0].locked_by().as_deref(), Some("w1"));
        assert!(claimed[0].locked_at().is_some());

        // Already claimed, a second worker gets nothing.
        assert!(store.claim_batch("w2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn claim_order_is_priority_then_age() {
        let store = MemoryJobStore::new();
        let low = store
            .create_job(TaskKind::CleanupOldJobs, json!({}), options())
            .await
            .unwrap();
        let high = store
            .create_job(
                TaskKind::UserJobScan,
                json!({}),
                JobOptions::builder().priority(10).build(),
            )
            .await
            .unwrap();

        let claimed = store.claim_batch("w1", 10).await.unwrap();
        assert_eq!(claimed[0].id(), high.id());
        assert_eq!(claimed[1].id(), low.id());
    }

    #[tokio::test]
    async fn delayed_job_is_not_claimable_yet() {
        let store = MemoryJobStore::new();
        store
            .create_job(
                TaskKind::UserJobScan,
                json!({}),
                JobOptions::builder()
                    .delay(std::time::Duration::from_secs(3600))
                    .build(),
            )
            .await
            .unwrap();

        assert!(store.claim_batch("w1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn dedup_key_collapses_live_duplicates() {
        let store = MemoryJobStore::new();
        let opts = JobOptions::builder().dedup_key("schedule:scan").build();
        let first = store
            .create_job(TaskKind::AutomatedJobScan, json!({}), opts.clone())
            .await
            .unwrap();
        let second = store
            .create_job(TaskKind::AutomatedJobScan, json!({}), opts.clone())
            .await
            .unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(*store.counts().await.unwrap().pending(), 1);

        // Still deduplicated while PROCESSING.
        store.claim_batch("w1", 1).await.unwrap();
        let third = store
            .create_job(TaskKind::AutomatedJobScan, json!({}), opts.clone())
            .await
            .unwrap();
        assert_eq!(third.id(), first.id());

        // Terminal jobs free the key.
        store.mark_completed(*first.id(), None).await.unwrap();
        let fourth = store
            .create_job(TaskKind::AutomatedJobScan, json!({}), opts)
            .await
            .unwrap();
        assert_ne!(fourth.id(), first.id());
    }

    #[tokio::test]
    async fn completed_jobs_are_retained_with_their_result() {
        let store = MemoryJobStore::new();
        let job = store
            .create_job(TaskKind::UserJobScan, json!({}), options())
            .await
            .unwrap();
        store.claim_batch("w1", 1).await.unwrap();
        store
            .mark_completed(*job.id(), Some(json!({"new_listings": 4})))
            .await
            .unwrap();

        let stored = store.get_job(*job.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), &JobStatus::Completed);
        assert_eq!(stored.result(), &Some(json!({"new_listings": 4})));
        assert_eq!(stored.attempt_count(), &0);
        assert!(stored.processed_at().is_some());
        assert!(stored.locked_by().is_none());
    }

    #[tokio::test]
    async fn reschedule_and_fail_both_record_the_attempt() {
        let store = MemoryJobStore::new();
        let job = store
            .create_job(TaskKind::AnalyzeJobMatch, json!({}), options())
            .await
            .unwrap();

        store.claim_batch("w1", 1).await.unwrap();
        let later = Utc::now() + chrono::Duration::seconds(2);
        store.reschedule(*job.id(), "boom", later).await.unwrap();

        let stored = store.get_job(*job.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), &JobStatus::Pending);
        assert_eq!(stored.attempt_count(), &1);
        assert_eq!(stored.available_at(), &later);
        assert_eq!(stored.error_message().as_deref(), Some("boom"));

        // Not claimable until available_at passes.
        assert!(store.claim_batch("w1", 1).await.unwrap().is_empty());

        store.reschedule(*job.id(), "late", Utc::now()).await.unwrap_err();

        // Claim again once available, then fail for good.
        store
            .reschedule_now_for_test(*job.id())
            .await;
        store.claim_batch("w1", 1).await.unwrap();
        store.mark_failed(*job.id(), "boom again").await.unwrap();
        let stored = store.get_job(*job.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), &JobStatus::Failed);
        assert_eq!(stored.attempt_count(), &2);
        assert_eq!(stored.error_message().as_deref(), Some("boom again"));
    }

    #[tokio::test]
    async fn releasing_an_unclaimed_job_is_an_error() {
        let store = MemoryJobStore::new();
        let job = store
            .create_job(TaskKind::UserJobScan, json!({}), options())
            .await
            .unwrap();

        let err = store.mark_completed(*job.id(), None).await.unwrap_err();
        assert!(matches!(err, QueueError::JobNotFound(id) if id == *job.id()));
    }

    #[tokio::test]
    async fn sweep_removes_only_old_terminal_jobs() {
        let store = MemoryJobStore::new();
        let done = store
            .create_job(TaskKind::UserJobScan, json!({}), options())
            .await
            .unwrap();
        let pending = store
            .create_job(TaskKind::UserJobScan, json!({}), options())
            .await
            .unwrap();
        store.claim_batch("w1", 1).await.unwrap();
        store.mark_completed(*done.id(), None).await.unwrap();

        let removed = store
            .sweep_terminal(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_job(*done.id()).await.unwrap().is_none());
        assert!(store.get_job(*pending.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_locks_are_released_without_counting_an_attempt() {
        let store = MemoryJobStore::new();
        let job = store
            .create_job(TaskKind::UserJobScan, json!({}), options())
            .await
            .unwrap();
        store.claim_batch("crashed_worker", 1).await.unwrap();

        let released = store
            .unlock_stale(Utc::now() + chrono::Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(released, 1);

        let stored = store.get_job(*job.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), &JobStatus::Pending);
        assert_eq!(stored.attempt_count(), &0);
        assert!(stored.locked_by().is_none());
    }

    impl MemoryJobStore {
        /// Test hook: make a pending job claimable right away.
        async fn reschedule_now_for_test(&self, id: JobId) {
            let mut inner = self.lock();
            let job = inner.jobs.get_mut(&id).unwrap();
            job.available_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }
}
