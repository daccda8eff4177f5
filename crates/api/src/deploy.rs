//! Deployment settings shared by the server runtime and its operators.

/// Env var holding the key required by admin routes (`X-Tableside-Admin-Key`).
pub const ENV_ADMIN_KEY: &str = "TABLESIDE_ADMIN_KEY";

/// Env var holding the shared secret for payment webhook signatures.
pub const ENV_WEBHOOK_SECRET: &str = "TABLESIDE_WEBHOOK_SECRET";

/// Env var overriding the idle timeout (seconds) after which sessions expire.
pub const ENV_SESSION_TIMEOUT_SECS: &str = "TABLESIDE_SESSION_TIMEOUT_SECS";

/// Env var controlling how often the sweeper runs (seconds, `0` disables).
pub const ENV_CLEANUP_INTERVAL_SECS: &str = "TABLESIDE_CLEANUP_INTERVAL_SECS";

/// Env var toggling the background sweeper.
pub const ENV_CLEANUP_ENABLED: &str = "TABLESIDE_CLEANUP_ENABLED";

/// Header carrying the admin key.
pub const ADMIN_KEY_HEADER: &str = "x-tableside-admin-key";

pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Parse a human-friendly boolean env flag value.
///
/// Accepted truthy values:
/// - `1`
/// - `true`
/// - `yes`
/// - `on`
pub fn parse_bool_flag(raw: Option<&str>, default: bool) -> bool {
    raw.map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
    .unwrap_or(default)
}

/// Parse a non-negative number of seconds, falling back to `default` when the
/// value is missing or malformed.
pub fn parse_secs(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::{parse_bool_flag, parse_secs};

    #[test]
    fn parses_truthy_values() {
        for value in ["1", "true", "TRUE", "yes", "on"] {
            assert!(parse_bool_flag(Some(value), false));
        }
    }

    #[test]
    fn parses_falsy_values() {
        for value in ["0", "false", "no", "off", ""] {
            assert!(!parse_bool_flag(Some(value), true));
        }
    }

    #[test]
    fn uses_default_for_missing_value() {
        assert!(parse_bool_flag(None, true));
        assert!(!parse_bool_flag(None, false));
    }

    #[test]
    fn parses_seconds_with_fallback() {
        assert_eq!(parse_secs(Some(" 120 "), 300), 120);
        assert_eq!(parse_secs(Some("0"), 300), 0);
        assert_eq!(parse_secs(Some("-5"), 300), 300);
        assert_eq!(parse_secs(Some("soon"), 300), 300);
        assert_eq!(parse_secs(None, 300), 300);
    }
}
