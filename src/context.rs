use getset::Getters;
use serde_json::Value;

use crate::client::QueueClient;
use crate::job::Job;
use crate::services::Services;

/// Everything a task handler can reach while it runs.
#[derive(Clone, Getters)]
#[getset(get = "pub")]
pub struct TaskContext {
    /// The claimed job being executed
    job: Job,
    /// Identifier of the worker loop executing the job
    worker_id: String,
    /// Queue handle, e.g. for enqueueing follow-up jobs
    client: QueueClient,
    /// External collaborators: job boards, the AI matcher, domain records
    services: Services,
}

impl TaskContext {
    pub fn new(job: Job, worker_id: String, client: QueueClient, services: Services) -> Self {
        TaskContext {
            job,
            worker_id,
            client,
            services,
        }
    }

    /// The payload stored on the job.
    pub fn payload(&self) -> &Value {
        self.job.payload()
    }
}
