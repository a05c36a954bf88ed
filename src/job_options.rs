use std::time::Duration;

use derive_builder::Builder;
use getset::Getters;
use uuid::Uuid;

/// Options controlling how a job is enqueued.
///
/// Every field is optional. Leaving one unset picks the queue default:
/// priority 1, three attempts, immediately runnable, no owner, no
/// deduplication.
#[derive(Getters, Debug, Clone, Default, Builder, PartialEq, Eq)]
#[getset(get = "pub")]
#[builder(
    build_fn(private, name = "build_internal"),
    setter(strip_option),
    default,
    pattern = "owned"
)]
pub struct JobOptions {
    /// Claim preference, higher claims sooner
    priority: Option<i16>,
    /// Attempts after which the job fails for good
    max_attempts: Option<i16>,
    /// Hold the job back for this long before it becomes claimable
    delay: Option<Duration>,
    /// User the job acts on behalf of
    user_id: Option<Uuid>,
    /// Collapses duplicate live jobs into one, see `JobStore::create_job`
    #[builder(setter(into))]
    dedup_key: Option<String>,
}

impl JobOptions {
    pub fn builder() -> JobOptionsBuilder {
        JobOptionsBuilder::default()
    }

    /// When a job enqueued at `now` with these options becomes claimable.
    pub(crate) fn available_from(&self, now: chrono::DateTime<chrono::Utc>) -> chrono::DateTime<chrono::Utc> {
        match self.delay {
            Some(delay) => {
                let delay = chrono::Duration::from_std(delay)
                    .unwrap_or_else(|_| chrono::Duration::days(3650));
                now + delay
            }
            None => now,
        }
    }
}

impl JobOptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> JobOptions {
        self.build_internal()
            .expect("There is no required field, this should never fail")
    }
}

impl From<Option<JobOptions>> for JobOptions {
    fn from(options: Option<JobOptions>) -> Self {
        options.unwrap_or_default()
    }
}
