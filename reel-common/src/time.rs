//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Format a capture timestamp the way slides and exports caption it ("Mar 5, 2024")
pub fn format_capture_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%b %-d, %Y").to_string()
}

/// Share of `total` covered by `elapsed`, as a 0.0-100.0 percentage
///
/// Returns 0.0 for a zero-length total.
pub fn percent_of(elapsed: std::time::Duration, total: std::time::Duration) -> f64 {
    if total.is_zero() {
        return 0.0;
    }
    (elapsed.as_secs_f64() / total.as_secs_f64() * 100.0).clamp(0.0, 100.0)
}
