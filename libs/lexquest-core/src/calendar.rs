//! Study-day calendar with a daily reset hour.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Timelike, Utc};

/// Study day of `now` in its own time zone.
///
/// If the current hour is before the reset hour, the study day is still
/// "yesterday". This lets late-night sessions count towards the previous day.
pub fn study_date_at<Tz: TimeZone>(now: &DateTime<Tz>, daily_reset_hour: u32) -> NaiveDate {
    if now.hour() < daily_reset_hour.min(23) {
        (now.clone() - Duration::days(1)).date_naive()
    } else {
        now.date_naive()
    }
}

/// Study day of a UTC instant in the user's local calendar.
pub fn study_date_of(instant: DateTime<Utc>, daily_reset_hour: u32) -> NaiveDate {
    study_date_at(&instant.with_timezone(&Local), daily_reset_hour)
}

/// Format a study day as YYYY-MM-DD.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Days from `from` (exclusive) to `to` (exclusive), oldest first.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    from.iter_days().skip(1).take_while(|d| *d < to).collect()
}
