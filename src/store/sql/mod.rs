pub(crate) mod claim_batch;
pub(crate) mod complete_job;
pub(crate) mod create_job;
pub(crate) mod fail_job;
pub(crate) mod job_row;
pub(crate) mod maintenance;
pub(crate) mod queue_stats;
