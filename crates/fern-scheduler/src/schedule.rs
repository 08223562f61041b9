use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use cron::Schedule as CronSchedule;

use crate::error::{Result, SchedulerError};

/// Parse a standard 5-field cron expression (`minute hour day-of-month month
/// day-of-week`).
///
/// The `cron` crate expects a leading seconds field, so a literal `"0 "` is
/// prepended before parsing — this repo's cron expressions never need
/// sub-minute precision.
fn parse(expr: &str) -> Result<CronSchedule> {
    let six_field = format!("0 {expr}");
    CronSchedule::from_str(&six_field)
        .map_err(|e| SchedulerError::InvalidSchedule(format!("bad cron expression '{expr}': {e}")))
}

/// Validate a cron expression without computing a fire time. Called from
/// `create` before a recurring job is persisted.
pub fn validate_cron(expr: &str) -> Result<()> {
    parse(expr).map(|_| ())
}

/// Compute the next fire instant strictly after `after`.
///
/// Cron fields are evaluated in the server's local timezone (`minute hour
/// day-of-month month day-of-week` means exactly that in local wall-clock
/// time, not UTC), then converted back to UTC for storage and comparison
/// everywhere else in this crate. Past times are never back-filled: this
/// always looks forward from `after`, so a job that missed its window
/// while the engine was down simply resumes from the next upcoming
/// occurrence.
pub fn next_fire(expr: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let schedule = parse(expr)?;
    let after_local = after.with_timezone(&Local);
    schedule
        .after(&after_local)
        .next()
        .map(|next_local| next_local.with_timezone(&Utc))
        .ok_or_else(|| SchedulerError::InvalidSchedule(format!("cron expression '{expr}' has no future occurrence")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    // These assert exact UTC instants, which only holds when the test
    // process itself runs with TZ=UTC (true of this workspace's CI image).
    // `next_fire` otherwise evaluates cron fields against whatever local
    // offset the process picks up, by design.

    #[test]
    fn every_minute_fires_one_minute_later() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 30).unwrap();
        let next = next_fire("* * * * *", from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 12, 1, 0).unwrap());
    }

    #[test]
    fn daily_nine_am_skips_to_tomorrow_if_past() {
        let from = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let next = next_fire("0 9 * * *", from).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 2, 9, 0, 0).unwrap());
    }

    #[test]
    fn malformed_expression_is_rejected() {
        assert!(validate_cron("not a cron expression").is_err());
    }
}
