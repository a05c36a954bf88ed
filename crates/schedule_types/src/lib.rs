use chrono::prelude::*;
use getset::Getters;

/// A schedule defines a task to be enqueued on a recurring basis
#[derive(Debug, PartialEq, Eq, Clone, Getters, Default)]
#[getset(get = "pub")]
pub struct Schedule {
    pub recurrence: Recurrence,
    pub task_identifier: String,
    pub options: ScheduleOptions,
    pub payload: Option<serde_json::Value>,
}

/// The cadence at which a schedule fires.
///
/// Cron expressions are reduced to one of these shapes at parse time. Interval
/// variants fire relative to when the scheduler starts; `DailyAt` aligns to
/// the UTC wall clock.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum Recurrence {
    /// Every `n` minutes (from `*/n` on the minute field)
    EveryMinutes(u32),
    /// Every `n` hours (from `*/n` on the hour field)
    EveryHours(u32),
    /// Once a day at the given UTC hour and minute
    DailyAt { hour: u32, minute: u32 },
    /// Fallback cadence for any expression the reducer does not recognize
    #[default]
    Hourly,
}

/// Schedule options
///
/// Parsed from HTTP query string syntax in schedule files, so the fields
/// deserialize directly.
#[derive(serde::Deserialize, Debug, PartialEq, Eq, Default, Getters, Clone)]
#[getset(get = "pub")]
pub struct ScheduleOptions {
    /// The ID is a unique alphanumeric case-sensitive identifier starting with a letter
    /// Specify an identifier for this schedule entry;
    /// By default this will use the task identifier,
    /// but if you want more than one schedule for the same task (e.g. with different payload, or different times)
    /// then you will need to supply a unique identifier explicitly.
    pub id: Option<String>,
    /// Override the max_attempts of the job (the max number of retries before giving up).
    pub max: Option<u16>,
    /// Override the priority of the job (affects the order in which it is claimed).
    pub priority: Option<i16>,
}

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;

impl Recurrence {
    /// The full interval between two consecutive firings
    ///
    /// ```rust
    /// use jobscout_schedule_types::Recurrence;
    ///
    /// assert_eq!(1800, Recurrence::EveryMinutes(30).period().num_seconds());
    /// assert_eq!(21600, Recurrence::EveryHours(6).period().num_seconds());
    /// assert_eq!(86400, Recurrence::DailyAt { hour: 3, minute: 0 }.period().num_seconds());
    /// assert_eq!(3600, Recurrence::Hourly.period().num_seconds());
    /// ```
    pub fn period(&self) -> chrono::Duration {
        match self {
            Recurrence::EveryMinutes(n) => chrono::Duration::seconds(*n as i64 * MINUTE),
            Recurrence::EveryHours(n) => chrono::Duration::seconds(*n as i64 * HOUR),
            Recurrence::DailyAt { .. } => chrono::Duration::seconds(DAY),
            Recurrence::Hourly => chrono::Duration::seconds(HOUR),
        }
    }

    /// How long to sleep from `now` until the next firing
    ///
    /// Interval variants simply wait one full period. `DailyAt` waits until
    /// the next occurrence of its wall clock time; if `now` is exactly on the
    /// mark the next firing is a day away.
    ///
    /// ```rust
    /// use jobscout_schedule_types::Recurrence;
    /// use chrono::prelude::*;
    ///
    /// let daily = Recurrence::DailyAt { hour: 3, minute: 30 };
    ///
    /// let before = Utc.with_ymd_and_hms(2024, 1, 15, 1, 0, 0).unwrap();
    /// assert_eq!(9000, daily.delay_until_next(&before).num_seconds());
    ///
    /// let after = Utc.with_ymd_and_hms(2024, 1, 15, 4, 0, 0).unwrap();
    /// assert_eq!(84600, daily.delay_until_next(&after).num_seconds());
    ///
    /// let interval = Recurrence::EveryMinutes(15);
    /// assert_eq!(900, interval.delay_until_next(&before).num_seconds());
    /// ```
    pub fn delay_until_next(&self, now: &DateTime<Utc>) -> chrono::Duration {
        match self {
            Recurrence::DailyAt { hour, minute } => {
                let target = *hour as i64 * HOUR + *minute as i64 * MINUTE;
                let elapsed = now.num_seconds_from_midnight() as i64;
                let mut delta = target - elapsed;
                if delta <= 0 {
                    delta += DAY;
                }
                chrono::Duration::seconds(delta)
            }
            _ => self.period(),
        }
    }
}

impl Schedule {
    /// Get the identifier of the schedule
    /// If the id option is specified, it will be used, otherwise the task identifier will be used
    pub fn identifier(&self) -> &str {
        self.options
            .id
            .as_deref()
            .unwrap_or(self.task_identifier.as_str())
    }
}
