use std::fmt;
use std::str::FromStr;

use crate::errors::QueueError;

/// The closed set of task identifiers the queue knows how to dispatch.
///
/// Keeping this an enum rather than free-form strings means a typo in an
/// enqueue call or a schedule file is a compile error or a parse error,
/// never a job that sits in the queue with no handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Scan one user's saved searches against the external job boards
    UserJobScan,
    /// Score a saved listing against its owner's profile
    AnalyzeJobMatch,
    /// Recurring scan over every user with automatic scanning enabled
    AutomatedJobScan,
    /// Delete match reviews whose expiry has passed
    CleanupExpiredReviews,
    /// Delete notifications whose expiry has passed
    CleanupExpiredNotifications,
    /// Delete scraped listings older than the retention window
    CleanupOldJobs,
}

impl TaskKind {
    /// Every task kind, in no particular order.
    pub const ALL: [TaskKind; 6] = [
        TaskKind::UserJobScan,
        TaskKind::AnalyzeJobMatch,
        TaskKind::AutomatedJobScan,
        TaskKind::CleanupExpiredReviews,
        TaskKind::CleanupExpiredNotifications,
        TaskKind::CleanupOldJobs,
    ];

    /// The identifier stored in the database and used in schedule files.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::UserJobScan => "user_job_scan",
            TaskKind::AnalyzeJobMatch => "analyze_job_match",
            TaskKind::AutomatedJobScan => "automated_job_scan",
            TaskKind::CleanupExpiredReviews => "cleanup_expired_reviews",
            TaskKind::CleanupExpiredNotifications => "cleanup_expired_notifications",
            TaskKind::CleanupOldJobs => "cleanup_old_jobs",
        }
    }

    /// Claim priority used when the caller does not pick one explicitly.
    ///
    /// Interactive work a user is waiting on outranks background scans,
    /// which in turn outrank housekeeping.
    pub fn default_priority(&self) -> i16 {
        match self {
            TaskKind::UserJobScan => 10,
            TaskKind::AnalyzeJobMatch => 8,
            TaskKind::AutomatedJobScan => 5,
            TaskKind::CleanupExpiredReviews
            | TaskKind::CleanupExpiredNotifications
            | TaskKind::CleanupOldJobs => 1,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .iter()
            .find(|kind| kind.as_str() == s)
            .copied()
            .ok_or_else(|| QueueError::UnknownTaskKind(s.to_string()))
    }
}
