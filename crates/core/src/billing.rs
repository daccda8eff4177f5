use serde::{Deserialize, Serialize};

use crate::ParseStatusError;

/// Billing state of a restaurant's subscription.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    PastDue,
    Cancelled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trial => "trial",
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    /// Whether the restaurant may open new table sessions at `now_unix`.
    ///
    /// `PastDue` keeps service running until the paid period ends.
    pub fn allows_service(&self, expires_at: Option<i64>, now_unix: i64) -> bool {
        let in_period = expires_at.is_none_or(|end| now_unix < end);
        match self {
            Self::Trial | Self::Active | Self::PastDue => in_period,
            Self::Cancelled | Self::Expired => false,
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SubscriptionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trial" => Ok(Self::Trial),
            "active" => Ok(Self::Active),
            "past_due" => Ok(Self::PastDue),
            "cancelled" => Ok(Self::Cancelled),
            "expired" => Ok(Self::Expired),
            other => Err(ParseStatusError::new("subscription status", other)),
        }
    }
}
