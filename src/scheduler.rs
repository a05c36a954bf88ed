//! Recurring schedule entries and the timer loop that enqueues them.
//!
//! The scheduler never runs work itself. Each due entry is enqueued as a
//! regular job with a `schedule:<id>` dedup key, so several instances can
//! run the same schedule table and the store collapses their enqueues into
//! one job, which exactly one worker then claims.

use chrono::Utc;
use jobscout_schedule_types::{Recurrence, Schedule};
use jobscout_shutdown_signal::ShutdownSignal;
use serde_json::{json, Value};
use tracing::{debug, error};

use crate::client::QueueClient;
use crate::errors::QueueError;
use crate::job_options::JobOptions;
use crate::task::TaskKind;

/// One recurring entry the scheduler maintains.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEntry {
    /// Stable identifier, also the basis of the dedup key
    pub id: String,
    pub task: TaskKind,
    pub recurrence: Recurrence,
    /// Disabled entries stay in the table but never fire
    pub enabled: bool,
    /// Payload for the enqueued job, `{}` when unset
    pub payload: Option<Value>,
    /// Overrides the task's default claim priority
    pub priority: Option<i16>,
    pub max_attempts: Option<i16>,
    /// Also fire once when the worker starts, on top of the recurrence
    pub run_on_startup: bool,
}

impl ScheduleEntry {
    /// An enabled entry firing on `recurrence`, nothing else set.
    pub fn new(id: impl Into<String>, task: TaskKind, recurrence: Recurrence) -> Self {
        ScheduleEntry {
            id: id.into(),
            task,
            recurrence,
            enabled: true,
            payload: None,
            priority: None,
            max_attempts: None,
            run_on_startup: false,
        }
    }

    pub(crate) fn dedup_key(&self) -> String {
        format!("schedule:{}", self.id)
    }
}

impl TryFrom<&Schedule> for ScheduleEntry {
    type Error = QueueError;

    fn try_from(schedule: &Schedule) -> Result<Self, Self::Error> {
        let task: TaskKind = schedule.task_identifier().parse()?;
        Ok(ScheduleEntry {
            id: schedule.identifier().to_string(),
            task,
            recurrence: *schedule.recurrence(),
            enabled: true,
            payload: schedule.payload().clone(),
            priority: *schedule.options().priority(),
            max_attempts: schedule
                .options()
                .max()
                .map(|max| max.min(i16::MAX as u16) as i16),
            run_on_startup: false,
        })
    }
}

/// Partial changes to apply to a schedule entry at runtime.
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub enabled: Option<bool>,
    pub recurrence: Option<Recurrence>,
    pub payload: Option<Value>,
    pub priority: Option<i16>,
    pub max_attempts: Option<i16>,
}

impl ScheduleUpdate {
    pub(crate) fn apply(&self, entry: &mut ScheduleEntry) {
        if let Some(enabled) = self.enabled {
            entry.enabled = enabled;
        }
        if let Some(recurrence) = self.recurrence {
            entry.recurrence = recurrence;
        }
        if let Some(payload) = &self.payload {
            entry.payload = Some(payload.clone());
        }
        if let Some(priority) = self.priority {
            entry.priority = Some(priority);
        }
        if let Some(max_attempts) = self.max_attempts {
            entry.max_attempts = Some(max_attempts);
        }
    }
}

/// The schedule table a worker starts with when none is configured.
///
/// Scans run through the day, housekeeping is spread over the small hours
/// so the daily jobs do not land on the queue at once. The cleanup entries
/// also fire on startup, a deployment that was down over night should not
/// wait a day to catch up.
pub fn default_schedules() -> Vec<ScheduleEntry> {
    let mut automated_scan = ScheduleEntry::new(
        "automated_job_scan",
        TaskKind::AutomatedJobScan,
        Recurrence::EveryMinutes(30),
    );
    automated_scan.max_attempts = Some(1);

    let mut cleanup_reviews = ScheduleEntry::new(
        "cleanup_expired_reviews",
        TaskKind::CleanupExpiredReviews,
        Recurrence::DailyAt { hour: 3, minute: 0 },
    );
    cleanup_reviews.run_on_startup = true;

    let mut cleanup_notifications = ScheduleEntry::new(
        "cleanup_expired_notifications",
        TaskKind::CleanupExpiredNotifications,
        Recurrence::DailyAt { hour: 3, minute: 30 },
    );
    cleanup_notifications.run_on_startup = true;

    let mut cleanup_old_jobs = ScheduleEntry::new(
        "cleanup_old_jobs",
        TaskKind::CleanupOldJobs,
        Recurrence::DailyAt { hour: 4, minute: 0 },
    );
    cleanup_old_jobs.run_on_startup = true;

    vec![
        automated_scan,
        cleanup_reviews,
        cleanup_notifications,
        cleanup_old_jobs,
    ]
}

/// Timer loop for one schedule entry. Ends on shutdown.
pub(crate) async fn run_schedule_entry(
    entry: ScheduleEntry,
    client: QueueClient,
    mut shutdown_signal: ShutdownSignal,
    fire_on_startup: bool,
) {
    if fire_on_startup && entry.run_on_startup {
        enqueue_scheduled_job(&entry, &client).await;
    }

    loop {
        let delay = entry
            .recurrence
            .delay_until_next(&Utc::now())
            .to_std()
            .unwrap_or_default();
        let timer = tokio::time::sleep(delay);

        tokio::select! {
            _ = timer => {
                enqueue_scheduled_job(&entry, &client).await;
            }
            _ = &mut shutdown_signal => break,
        }
    }
}

/// Enqueue errors are logged, not propagated. A schedule must survive a
/// store hiccup and just try again on its next tick.
async fn enqueue_scheduled_job(entry: &ScheduleEntry, client: &QueueClient) {
    let mut options = JobOptions::builder()
        .priority(entry.priority.unwrap_or_else(|| entry.task.default_priority()))
        .dedup_key(entry.dedup_key());
    if let Some(max_attempts) = entry.max_attempts {
        options = options.max_attempts(max_attempts);
    }

    let payload = entry.payload.clone().unwrap_or_else(|| json!({}));
    match client.enqueue(entry.task, payload, options.build()).await {
        Ok(job) => {
            debug!(
                schedule_id = %entry.id,
                task = entry.task.as_str(),
                job_id = %job.id(),
                "Scheduled job enqueued"
            );
        }
        Err(e) => {
            error!(
                error = ?e,
                schedule_id = %entry.id,
                "Could not enqueue scheduled job"
            );
        }
    }
}
