//! Formatting utilities

use chrono::{Local, LocalResult, TimeZone};
use std::fmt::Display;

/// Format a member time for list output (`YYYY-MM-DD HH:MM`, local time).
///
/// Members without a usable time stamp show the Unix epoch.
pub fn format_list_time(unix_seconds: Option<i64>) -> String {
    format_time_in(&Local, unix_seconds.unwrap_or(0))
}

/// Format `unix_seconds` as `YYYY-MM-DD HH:MM` in `zone`
pub fn format_time_in<Tz>(zone: &Tz, unix_seconds: i64) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match zone.timestamp_opt(unix_seconds, 0) {
        LocalResult::Single(time) | LocalResult::Ambiguous(time, _) => {
            time.format("%Y-%m-%d %H:%M").to_string()
        }
        LocalResult::None => "????-??-?? ??:??".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_format_time_in_utc() {
        assert_eq!(format_time_in(&Utc, 0), "1970-01-01 00:00");
        assert_eq!(format_time_in(&Utc, 1_234_567_890), "2009-02-13 23:31");
        assert_eq!(format_time_in(&Utc, i64::MAX), "????-??-?? ??:??");
    }

    #[test]
    fn test_format_list_time_shape() {
        let text = format_list_time(Some(1_234_567_890));
        assert_eq!(text.len(), 16);
        assert_eq!(&text[4..5], "-");
        assert_eq!(&text[13..14], ":");
        assert_eq!(format_list_time(None).len(), 16);
    }
}
