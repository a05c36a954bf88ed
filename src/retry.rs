use std::time::Duration;

use chrono::{DateTime, Utc};

/// First retry waits this long, each later retry doubles it.
pub(crate) const BASE_DELAY_MS: u64 = 1_000;
/// Retries never wait longer than this.
pub(crate) const MAX_DELAY_MS: u64 = 30_000;

/// How a failed attempt asked to be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDirective {
    /// Permanent failure, do not retry
    Never,
    /// Retry after an explicit delay chosen by the handler
    After(Duration),
    /// Retry on the default exponential backoff curve
    Backoff,
}

/// What the queue does with a job after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Return the job to the queue, claimable again at `available_at`
    Reschedule { available_at: DateTime<Utc> },
    /// Mark the job failed for good
    Fail,
}

/// Backoff delay for the retry that follows `prior_failures` recorded
/// failures.
///
/// Doubles per failure starting from one second, capped at thirty seconds:
/// 1s, 2s, 4s, 8s, 16s, 30s, 30s, ...
pub fn backoff_delay(prior_failures: i16) -> Duration {
    let exponent = prior_failures.clamp(0, 15) as u32;
    let ms = (BASE_DELAY_MS * 2u64.pow(exponent)).min(MAX_DELAY_MS);
    Duration::from_millis(ms)
}

/// Decide what happens to a job whose current attempt just failed.
///
/// `attempt_count` is the count recorded on the job before this failure,
/// so the attempt being decided on is number `attempt_count + 1`. A job
/// fails for good once that number reaches `max_attempts`, or immediately
/// when the handler says the failure can never heal.
pub fn decide(
    attempt_count: i16,
    max_attempts: i16,
    directive: RetryDirective,
    now: DateTime<Utc>,
) -> RetryDecision {
    let failed_attempts = attempt_count.saturating_add(1);
    if directive == RetryDirective::Never || failed_attempts >= max_attempts {
        return RetryDecision::Fail;
    }

    let delay = match directive {
        RetryDirective::After(delay) => delay,
        _ => backoff_delay(attempt_count),
    };
    let delay = chrono::Duration::from_std(delay)
        .unwrap_or_else(|_| chrono::Duration::milliseconds(MAX_DELAY_MS as i64));

    RetryDecision::Reschedule {
        available_at: now + delay,
    }
}
