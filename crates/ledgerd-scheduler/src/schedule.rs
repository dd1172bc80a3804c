use std::str::FromStr;

use chrono::{DateTime, Local, Utc};

use crate::error::{Result, SchedulerError};

/// Parse a six- or seven-field cron expression (seconds first, optional year).
pub fn parse_cron(expression: &str) -> Result<cron::Schedule> {
    cron::Schedule::from_str(expression.trim()).map_err(|e| SchedulerError::InvalidSchedule {
        expression: expression.to_string(),
        reason: e.to_string(),
    })
}

/// Compute the first instant strictly *after* `from` matched by `schedule`.
///
/// Fields are evaluated against local wall-clock time. Returns `None` when
/// the schedule has no further matches (e.g. a past year).
pub fn next_after(schedule: &cron::Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    schedule
        .after(&from.with_timezone(&Local))
        .next()
        .map(|dt| dt.with_timezone(&Utc))
}
