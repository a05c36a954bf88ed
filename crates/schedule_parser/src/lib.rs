use jobscout_schedule_types::Schedule;
pub use nom::error::ErrorKind;
use nom_schedule::nom_schedule;
use thiserror::Error;

mod nom_expression;
mod nom_schedule;
mod nom_schedule_opts;
mod nom_schedule_payload;
mod nom_task_identifier;
mod types;

#[derive(Error, Debug)]
#[error("An error occured while parsing schedule file : \n{msg}")]
pub struct ScheduleParseError {
    pub msg: String,
    pub input: String,
    pub error_kind: ErrorKind,
}

impl<'a> From<nom::Err<nom::error::Error<&'a str>>> for ScheduleParseError {
    fn from(e: nom::Err<nom::error::Error<&'a str>>) -> Self {
        let msg = format!("{e:?}");
        let (input, error_kind) = match e {
            // Should not happen (only for streams)
            nom::Err::Incomplete(_) => (String::from(""), ErrorKind::Fail),
            nom::Err::Error(e) | nom::Err::Failure(e) => (e.to_string(), e.code),
        };

        ScheduleParseError {
            msg,
            input,
            error_kind,
        }
    }
}

/// Parse a schedule file into a Vec of schedules
///
/// Schedule files use a cron inspired line format, but the expressions are
/// deliberately not full cron: each line is reduced at parse time to one of a
/// handful of recurrence shapes. All times are UTC. The following diagram
/// details the parts of a schedule line:
///
/// ```schedule
/// ┌───────────── UTC minute (0 - 59)
/// │ ┌───────────── UTC hour (0 - 23)
/// │ │ ┌───────────── UTC day of the month (1 - 31)
/// │ │ │ ┌───────────── UTC month (1 - 12)
/// │ │ │ │ ┌───────────── UTC day of the week (0 - 6) (Sunday to Saturday)
/// │ │ │ │ │ ┌───────────── task (identifier) to schedule
/// │ │ │ │ │ │    ┌────────── optional scheduling options
/// │ │ │ │ │ │    │     ┌────── optional payload to merge
/// │ │ │ │ │ │    │     │
/// │ │ │ │ │ │    │     │
/// * * * * * task ?opts {payload}
/// ```
///
/// Comment lines start with a `#`. Blank lines are ignored.
///
/// Only three expression shapes are interpreted:
///
/// - `*/n * * * *` - run every `n` minutes
/// - `m */n * * *` - run every `n` hours (the fixed minute is accepted but
///   the interval counts from scheduler start, so it is not honored)
/// - `m h * * *` - run once a day at `h:m` UTC
///
/// Any other expression that still looks like cron syntax (ranges, lists,
/// day of week or month restrictions, out of bounds values) parses
/// successfully and runs hourly. Tokens that are not cron syntax at all fail
/// the parse.
///
/// The task identifier should match the following regexp
/// `/^[_a-zA-Z][_a-zA-Z0-9:_-]*$/` (namely it should start with an alphabetic
/// character and it should only contain alphanumeric characters, colon,
/// underscore and hyphen). It should be the name of one of the registered
/// tasks.
///
/// The `opts` must always be prefixed with a `?` if provided. Options are
/// specified using HTTP query string syntax (with `&` separator).
///
/// Currently we support the following `opts`:
///
/// - `id=UID` where UID is a unique alphanumeric case-sensitive identifier
///   starting with a letter - specify an identifier for this schedule entry;
///   by default this will use the task identifier, but if you want more than
///   one schedule for the same task (e.g. with different payload, or
///   different times) then you will need to supply a unique identifier
///   explicitly.
/// - `max=n` where `n` is a small positive integer - override the
///   `max_attempts` of the job.
/// - `priority=n` where `n` is a relatively small integer - override the
///   priority of the job.
///
/// **NOTE**: changing the identifier (e.g. via `id`) changes the
/// deduplication key of the jobs the entry enqueues, so we recommend that you
/// explicitly set it and never change it.
///
/// The `payload` is a JSON5 object; it must start with a `{`, must not
/// contain newlines or carriage returns (`\n` or `\r`), and must not contain
/// trailing whitespace other than the end of line.
///
/// ```rust
/// use jobscout_schedule_parser::parse_schedules;
/// use jobscout_schedule_types::Recurrence;
///
/// let schedules = parse_schedules(
///     "*/30 * * * * automated_job_scan\n0 4 * * * cleanup_old_jobs {retentionDays:90}",
/// )
/// .unwrap();
///
/// assert_eq!(2, schedules.len());
/// assert_eq!(Recurrence::EveryMinutes(30), *schedules[0].recurrence());
/// assert_eq!(
///     Recurrence::DailyAt { hour: 4, minute: 0 },
///     *schedules[1].recurrence()
/// );
/// ```
pub fn parse_schedules(schedules: &str) -> Result<Vec<Schedule>, ScheduleParseError> {
    let (rest, result) = nom_schedule(schedules)?;

    // A malformed line stops the line parser without consuming the rest of
    // the file. Surface it instead of dropping schedules on the floor.
    if !rest.is_empty() {
        let line = rest.lines().next().unwrap_or(rest);
        return Err(ScheduleParseError {
            msg: format!("Unparseable schedule line : \n{line}"),
            input: rest.to_string(),
            error_kind: ErrorKind::Fail,
        });
    }

    Ok(result)
}
