//! Maps a wall-clock hour to its position in a provider time series.
//!
//! Providers return `hourly.time` in ascending order as local timestamps
//! (`YYYY-MM-DDTHH:MM`). Lookups are prefix matches so callers can ask for
//! an hour (`YYYY-MM-DDTHH`) without knowing the minute layout.

use chrono::{NaiveDate, NaiveDateTime};

/// Format of the prefix identifying one hour of one day.
pub const HOUR_PREFIX_FORMAT: &str = "%Y-%m-%dT%H";

/// Lowest index whose entry begins with `target_prefix`.
///
/// First match wins: duplicate-prefix entries (sub-hourly samples) resolve
/// to the earliest one. An empty prefix matches index 0 of any non-empty
/// series; an empty series never matches.
pub fn locate<S: AsRef<str>>(series: &[S], target_prefix: &str) -> Option<usize> {
    series
        .iter()
        .position(|entry| entry.as_ref().starts_with(target_prefix))
}

/// Prefix for `hour` on `date`, e.g. `2025-01-14T15`.
pub fn hour_prefix(date: NaiveDate, hour: u32) -> String {
    format!("{}T{:02}", date.format("%Y-%m-%d"), hour)
}

/// Prefix for the hour containing `now`.
pub fn current_hour_prefix(now: NaiveDateTime) -> String {
    now.format(HOUR_PREFIX_FORMAT).to_string()
}
