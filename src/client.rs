use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::handler::TaskHandler;
use crate::job::{Job, JobId};
use crate::job_options::JobOptions;
use crate::metrics::QueueMetrics;
use crate::store::JobStore;
use crate::task::TaskKind;

/// Handle for enqueueing jobs and inspecting the queue.
///
/// Cheap to clone, every clone talks to the same store. Handlers get one
/// through [`TaskContext`](crate::TaskContext) so they can enqueue
/// follow-up work.
#[derive(Clone)]
pub struct QueueClient {
    store: Arc<dyn JobStore>,
    /// Worker loops currently running against this handle
    worker_count: Arc<AtomicUsize>,
}

impl QueueClient {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            worker_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Enqueue a job through its typed handler.
    ///
    /// The payload type pins the task kind, so a `UserJobScan` payload can
    /// never end up enqueued under another identifier.
    pub async fn enqueue_task<T: TaskHandler>(
        &self,
        payload: T,
        options: JobOptions,
    ) -> Result<Job> {
        let payload = serde_json::to_value(payload)?;
        self.enqueue(T::KIND, payload, options).await
    }

    /// Enqueue a job for `task` with an untyped JSON payload.
    pub async fn enqueue(
        &self,
        task: TaskKind,
        payload: Value,
        options: JobOptions,
    ) -> Result<Job> {
        let job = self.store.create_job(task, payload, options).await?;
        debug!(
            task = task.as_str(),
            job_id = %job.id(),
            priority = job.priority(),
            "Job enqueued"
        );
        Ok(job)
    }

    pub async fn job(&self, id: JobId) -> Result<Option<Job>> {
        self.store.get_job(id).await
    }

    /// Snapshot of queue counts plus how many workers share this handle.
    pub async fn metrics(&self) -> Result<QueueMetrics> {
        let counts = self.store.counts().await?;
        Ok(QueueMetrics::from_counts(
            counts,
            self.worker_count.load(Ordering::Relaxed),
        ))
    }

    /// Delete terminal jobs that finished before `older_than`.
    pub async fn sweep_terminal(&self, older_than: DateTime<Utc>) -> Result<u64> {
        self.store.sweep_terminal(older_than).await
    }

    /// Release claims held longer than `locked_before`, e.g. by a crashed
    /// worker.
    pub async fn unlock_stale(&self, locked_before: DateTime<Utc>) -> Result<u64> {
        self.store.unlock_stale(locked_before).await
    }

    pub(crate) fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// RAII guard keeping the `workers` metric accurate across worker
    /// loop lifetimes, including panics.
    pub(crate) fn worker_gauge(&self) -> WorkerGauge {
        self.worker_count.fetch_add(1, Ordering::Relaxed);
        WorkerGauge {
            worker_count: self.worker_count.clone(),
        }
    }
}

pub(crate) struct WorkerGauge {
    worker_count: Arc<AtomicUsize>,
}

impl Drop for WorkerGauge {
    fn drop(&mut self) {
        self.worker_count.fetch_sub(1, Ordering::Relaxed);
    }
}
