use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Subscription status as reported by the payment provider.
///
/// Statuses this service does not interpret are kept verbatim in `Other`
/// so they round-trip to the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlanStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
    Other(String),
}

impl PlanStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PlanStatus::Active => "active",
            PlanStatus::Trialing => "trialing",
            PlanStatus::PastDue => "past_due",
            PlanStatus::Canceled => "canceled",
            PlanStatus::Incomplete => "incomplete",
            PlanStatus::IncompleteExpired => "incomplete_expired",
            PlanStatus::Unpaid => "unpaid",
            PlanStatus::Paused => "paused",
            PlanStatus::Other(raw) => raw.as_str(),
        }
    }

    /// Convert from the provider's subscription status string
    pub fn from_provider(s: &str) -> Self {
        match s {
            "active" => PlanStatus::Active,
            "trialing" => PlanStatus::Trialing,
            "past_due" => PlanStatus::PastDue,
            "canceled" => PlanStatus::Canceled,
            "incomplete" => PlanStatus::Incomplete,
            "incomplete_expired" => PlanStatus::IncompleteExpired,
            "unpaid" => PlanStatus::Unpaid,
            "paused" => PlanStatus::Paused,
            other => PlanStatus::Other(other.to_string()),
        }
    }

    pub fn is_trialing(&self) -> bool {
        matches!(self, PlanStatus::Trialing)
    }

    pub fn is_canceled(&self) -> bool {
        matches!(self, PlanStatus::Canceled)
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PlanStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PlanStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(PlanStatus::from_provider(&raw))
    }
}
