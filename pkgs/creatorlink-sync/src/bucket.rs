//! Relative-time buckets for conversation lists
//!
//! All functions take "now" explicitly. Calendar days and weeks are evaluated in the
//! time zone of `now`, so callers pass a local `DateTime` to get local calendar days.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Relative-time bucket, in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeBucket {
    Today,
    Yesterday,
    ThisWeek,
    Earlier,
}

impl TimeBucket {
    pub const ALL: [TimeBucket; 4] = [
        TimeBucket::Today,
        TimeBucket::Yesterday,
        TimeBucket::ThisWeek,
        TimeBucket::Earlier,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            TimeBucket::Today => "Today",
            TimeBucket::Yesterday => "Yesterday",
            TimeBucket::ThisWeek => "This Week",
            TimeBucket::Earlier => "Earlier",
        }
    }
}

impl fmt::Display for TimeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify `timestamp` relative to `now`, with weeks starting on Sunday
pub fn classify<Tz: TimeZone>(timestamp: DateTime<Utc>, now: &DateTime<Tz>) -> TimeBucket {
    classify_with_week_start(timestamp, now, Weekday::Sun)
}

/// Classify `timestamp` relative to `now`
///
/// Predicates are tried in the order Today, Yesterday, This Week; the first match wins
/// and anything else (including far-future dates) is `Earlier`.
pub fn classify_with_week_start<Tz: TimeZone>(
    timestamp: DateTime<Utc>,
    now: &DateTime<Tz>,
    week_start: Weekday,
) -> TimeBucket {
    let day = timestamp.with_timezone(&now.timezone()).date_naive();
    let today = now.date_naive();

    if day == today {
        TimeBucket::Today
    } else if today.pred_opt() == Some(day) {
        TimeBucket::Yesterday
    } else if start_of_week(day, week_start) == start_of_week(today, week_start) {
        TimeBucket::ThisWeek
    } else {
        TimeBucket::Earlier
    }
}

/// Display label for a conversation list row
///
/// `3:45 PM` for today, `Yesterday`, `Mon` within the week, `Mar 5` otherwise.
pub fn format_label<Tz>(timestamp: DateTime<Utc>, now: &DateTime<Tz>, week_start: Weekday) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let local = timestamp.with_timezone(&now.timezone());
    match classify_with_week_start(timestamp, now, week_start) {
        TimeBucket::Today => local.format("%-I:%M %p").to_string(),
        TimeBucket::Yesterday => "Yesterday".to_string(),
        TimeBucket::ThisWeek => local.format("%a").to_string(),
        TimeBucket::Earlier => local.format("%b %-d").to_string(),
    }
}

fn start_of_week(day: NaiveDate, week_start: Weekday) -> NaiveDate {
    let offset = (7 + day.weekday().num_days_from_sunday() - week_start.num_days_from_sunday()) % 7;
    day.checked_sub_days(Days::new(offset as u64))
        .unwrap_or(NaiveDate::MIN)
}
