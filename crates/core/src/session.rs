use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ParseStatusError;

/// Default idle timeout after which the sweeper expires a session.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 5 * 60;

/// Lifecycle state of a table session.
///
/// `Active` is the only initial state. `Cancelled` (explicit release) and
/// `Expired` (idle past the timeout) are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Cancelled,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }

    /// Apply a lifecycle event, returning the next state.
    pub fn apply(self, event: SessionEvent) -> Result<Self, TransitionError> {
        match (self, event) {
            (Self::Active, SessionEvent::Touch) => Ok(Self::Active),
            (Self::Active, SessionEvent::Release) => Ok(Self::Cancelled),
            (Self::Active, SessionEvent::Expire) => Ok(Self::Expired),
            (from, event) => Err(TransitionError::Terminal { from, event }),
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(ParseStatusError::new("session status", other)),
        }
    }
}

/// Something that happens to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Heartbeat or interaction.
    Touch,
    /// Explicit release of the table.
    Release,
    /// Cleanup found the session idle past the timeout.
    Expire,
}

impl SessionEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Touch => "touch",
            Self::Release => "release",
            Self::Expire => "expire",
        }
    }
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransitionError {
    #[error("session is {from}; cannot {event}")]
    Terminal {
        from: SessionStatus,
        event: SessionEvent,
    },
}

/// Occupancy of a physical dining table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TableStatus {
    Available,
    Occupied,
    Reserved,
}

impl TableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Reserved => "reserved",
        }
    }
}

impl std::fmt::Display for TableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TableStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(Self::Available),
            "occupied" => Ok(Self::Occupied),
            "reserved" => Ok(Self::Reserved),
            other => Err(ParseStatusError::new("table status", other)),
        }
    }
}

/// True when a session last seen at `last_activity_unix` has been silent for
/// strictly longer than `timeout_secs`.
pub fn is_idle(last_activity_unix: i64, now_unix: i64, timeout_secs: u64) -> bool {
    now_unix.saturating_sub(last_activity_unix) > timeout_as_i64(timeout_secs)
}

/// Sessions with `last_activity_at < idle_cutoff(now, timeout)` are idle.
pub fn idle_cutoff(now_unix: i64, timeout_secs: u64) -> i64 {
    now_unix.saturating_sub(timeout_as_i64(timeout_secs))
}

fn timeout_as_i64(timeout_secs: u64) -> i64 {
    i64::try_from(timeout_secs).unwrap_or(i64::MAX)
}
