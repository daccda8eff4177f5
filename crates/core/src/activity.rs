//! Client-side activity tracking primitives.
//!
//! The tracker pings the server on a fixed heartbeat interval and on user
//! interactions, but never more often than the throttle allows. Only sustained
//! silence for the whole idle timeout lets the server expire a session.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::DEFAULT_IDLE_TIMEOUT_SECS;

pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 45;
pub const DEFAULT_THROTTLE_SECS: u64 = 5;

/// Heartbeat interval, throttle, and server idle timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityTimings {
    pub heartbeat_interval: Duration,
    pub throttle: Duration,
    pub idle_timeout: Duration,
}

impl Default for ActivityTimings {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_INTERVAL_SECS),
            throttle: Duration::from_secs(DEFAULT_THROTTLE_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TimingError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("heartbeat interval ({interval:?}) must be shorter than the idle timeout ({timeout:?})")]
    IntervalNotUnderTimeout {
        interval: Duration,
        timeout: Duration,
    },
}

impl ActivityTimings {
    pub fn from_secs(heartbeat_interval: u64, throttle: u64, idle_timeout: u64) -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(heartbeat_interval),
            throttle: Duration::from_secs(throttle),
            idle_timeout: Duration::from_secs(idle_timeout),
        }
    }

    /// Reject settings under which a healthy client could still be expired.
    pub fn validate(&self) -> Result<(), TimingError> {
        for (field, value) in [
            ("heartbeat interval", self.heartbeat_interval),
            ("throttle", self.throttle),
            ("idle timeout", self.idle_timeout),
        ] {
            if value.is_zero() {
                return Err(TimingError::Zero { field });
            }
        }
        if self.heartbeat_interval >= self.idle_timeout {
            return Err(TimingError::IntervalNotUnderTimeout {
                interval: self.heartbeat_interval,
                timeout: self.idle_timeout,
            });
        }
        Ok(())
    }
}

/// Admits at most one event per `min_gap`.
#[derive(Debug, Clone)]
pub struct Throttle {
    min_gap: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last: None,
        }
    }

    /// Returns true (and records `now`) when the gap since the last admitted
    /// event is at least `min_gap`.
    pub fn admit(&mut self, now: Instant) -> bool {
        let open = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.min_gap,
        };
        if open {
            self.last = Some(now);
        }
        open
    }

    pub fn last_admitted(&self) -> Option<Instant> {
        self.last
    }
}

/// User interaction that counts as activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Interaction {
    Click,
    Scroll,
    Keypress,
    Touch,
    PointerMove,
    VisibilityChange,
}

impl Interaction {
    pub const ALL: [Interaction; 6] = [
        Self::Click,
        Self::Scroll,
        Self::Keypress,
        Self::Touch,
        Self::PointerMove,
        Self::VisibilityChange,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Scroll => "scroll",
            Self::Keypress => "keypress",
            Self::Touch => "touch",
            Self::PointerMove => "pointer-move",
            Self::VisibilityChange => "visibility-change",
        }
    }
}

impl std::fmt::Display for Interaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Interaction {
    type Err = crate::ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| crate::ParseStatusError::new("interaction", s))
    }
}

/// Why the tracker sent an activity update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "interaction")]
pub enum ActivitySource {
    Heartbeat,
    Interaction(Interaction),
    Unload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let timings = ActivityTimings::default();
        assert_eq!(timings.heartbeat_interval, Duration::from_secs(45));
        assert_eq!(timings.throttle, Duration::from_secs(5));
        assert_eq!(timings.idle_timeout, Duration::from_secs(300));
        assert!(timings.validate().is_ok());
    }

    #[test]
    fn zero_values_are_rejected() {
        let err = ActivityTimings::from_secs(0, 5, 300).validate().unwrap_err();
        assert_eq!(
            err,
            TimingError::Zero {
                field: "heartbeat interval"
            }
        );
        assert!(ActivityTimings::from_secs(45, 0, 300).validate().is_err());
        assert!(ActivityTimings::from_secs(45, 5, 0).validate().is_err());
    }

    #[test]
    fn interval_must_fit_inside_timeout() {
        let err = ActivityTimings::from_secs(300, 5, 300)
            .validate()
            .unwrap_err();
        assert!(matches!(err, TimingError::IntervalNotUnderTimeout { .. }));
        assert!(ActivityTimings::from_secs(299, 5, 300).validate().is_ok());
    }

    #[test]
    fn throttle_admits_first_event_then_waits_for_gap() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_secs(5));
        assert!(throttle.admit(start));
        assert!(!throttle.admit(start + Duration::from_secs(1)));
        assert!(!throttle.admit(start + Duration::from_millis(4_999)));
        assert!(throttle.admit(start + Duration::from_secs(5)));
        assert_eq!(
            throttle.last_admitted(),
            Some(start + Duration::from_secs(5))
        );
    }

    #[test]
    fn rejected_events_do_not_extend_the_window() {
        let start = Instant::now();
        let mut throttle = Throttle::new(Duration::from_secs(5));
        assert!(throttle.admit(start));
        for ms in (500..5_000).step_by(500) {
            assert!(!throttle.admit(start + Duration::from_millis(ms)));
        }
        assert!(throttle.admit(start + Duration::from_millis(5_000)));
    }

    #[test]
    fn interactions_parse_dom_style_names() {
        assert_eq!("click".parse::<Interaction>().unwrap(), Interaction::Click);
        assert_eq!(
            " Pointer_Move ".parse::<Interaction>().unwrap(),
            Interaction::PointerMove
        );
        assert_eq!(
            "visibility-change".parse::<Interaction>().unwrap(),
            Interaction::VisibilityChange
        );
        assert!("hover".parse::<Interaction>().is_err());
        for kind in Interaction::ALL {
            assert_eq!(kind.as_str().parse::<Interaction>().unwrap(), kind);
        }
    }

    #[test]
    fn activity_source_serializes_with_tag() {
        let json =
            serde_json::to_value(ActivitySource::Interaction(Interaction::Scroll)).unwrap();
        assert_eq!(json["kind"], "interaction");
        assert_eq!(json["interaction"], "scroll");
        let json = serde_json::to_value(ActivitySource::Heartbeat).unwrap();
        assert_eq!(json["kind"], "heartbeat");
    }
}
