pub mod list;
pub mod logs;
pub mod reset;
pub mod route;
pub mod stats;
pub mod track;

use chrono::{Local, TimeZone};

/// Render epoch milliseconds in local time, `yyyy-MM-dd HH:mm:ss.SSS`.
pub fn format_millis(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        None => format!("{millis} ms"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_millis_keeps_milliseconds() {
        let text = format_millis(1_700_000_000_123);
        assert_eq!(text.len(), 23);
        assert!(text.ends_with(".123"));
    }
}
