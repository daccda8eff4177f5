pub mod activity;
pub mod billing;
pub mod session;

pub use activity::{ActivitySource, ActivityTimings, Interaction, Throttle, TimingError};
pub use billing::SubscriptionStatus;
pub use session::{SessionEvent, SessionStatus, TableStatus, TransitionError};

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// A stored or user-supplied status string that names no known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseStatusError {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
