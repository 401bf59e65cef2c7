// SPDX-License-Identifier: MIT

//! Shared helpers for date/time formatting.

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Interpret a naive wall-clock timestamp in the server's local timezone.
///
/// Ambiguous times (DST fold) resolve to the earlier instant; times inside a
/// DST gap are shifted forward by the local offset rules.
pub fn naive_local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => {
            dt.with_timezone(&Utc)
        }
        chrono::LocalResult::None => Utc.from_utc_datetime(&naive),
    }
}

/// Format a naive local timestamp as RFC3339 with the local UTC offset spelled
/// out, e.g. `2024-01-10T09:00:00-08:00`. Google Calendar rejects bare
/// wall-clock times, and a plain `Z` would shift the event for non-UTC users.
pub fn format_local_rfc3339(naive: NaiveDateTime) -> String {
    let dt = match Local.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) | chrono::LocalResult::Ambiguous(dt, _) => dt,
        chrono::LocalResult::None => Local
            .from_utc_datetime(&Utc.from_utc_datetime(&naive).naive_utc())
            .with_timezone(&Local),
    };
    dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}
