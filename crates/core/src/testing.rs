use crate::ActivityTimings;

/// Unix timestamp used as "now" by fixtures (2026-01-01T00:00:00Z).
pub const NOW: i64 = 1_767_225_600;

/// Production timings (interval 45s, throttle 5s, timeout 300s).
pub fn timings() -> ActivityTimings {
    ActivityTimings::default()
}

/// Timings with custom values in seconds.
pub fn timings_secs(interval: u64, throttle: u64, timeout: u64) -> ActivityTimings {
    ActivityTimings::from_secs(interval, throttle, timeout)
}

/// Seconds before [`NOW`].
pub fn ago(secs: i64) -> i64 {
    NOW - secs
}
