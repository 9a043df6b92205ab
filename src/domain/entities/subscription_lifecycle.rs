use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::{plan_status::PlanStatus, user::UserProfile};

/// Lifecycle stage of a user's subscription, derived from the local record.
///
/// `NONE -> TRIALING -> ACTIVE -> CANCELING -> CANCELED`; any other provider
/// status is carried through as `Provider`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionLifecycle {
    None,
    Trialing,
    Active,
    Canceling,
    Canceled,
    Provider(PlanStatus),
}

impl SubscriptionLifecycle {
    pub fn of(user: &UserProfile, now: DateTime<Utc>) -> Self {
        match &user.plan_status {
            None => SubscriptionLifecycle::None,
            Some(PlanStatus::Trialing) if user.is_in_trial => SubscriptionLifecycle::Trialing,
            Some(PlanStatus::Trialing) | Some(PlanStatus::Active) if user.is_subscribed => {
                SubscriptionLifecycle::Active
            }
            Some(PlanStatus::Canceled) => match user.subscription_ends_at {
                Some(end) if end > now => SubscriptionLifecycle::Canceling,
                _ => SubscriptionLifecycle::Canceled,
            },
            Some(other) => SubscriptionLifecycle::Provider(other.clone()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionLifecycle::None => "none",
            SubscriptionLifecycle::Trialing => "trialing",
            SubscriptionLifecycle::Active => "active",
            SubscriptionLifecycle::Canceling => "canceling",
            SubscriptionLifecycle::Canceled => "canceled",
            SubscriptionLifecycle::Provider(status) => status.as_str(),
        }
    }
}

impl Serialize for SubscriptionLifecycle {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_user, test_datetime, test_datetime_offset_days};

    #[test]
    fn fresh_user_has_no_subscription() {
        let user = create_test_user(|_| {});
        assert_eq!(
            SubscriptionLifecycle::of(&user, test_datetime()),
            SubscriptionLifecycle::None
        );
    }

    #[test]
    fn trial_user_is_trialing() {
        let user = create_test_user(|u| {
            u.plan_status = Some(PlanStatus::Trialing);
            u.is_in_trial = true;
            u.is_subscribed = true;
        });
        assert_eq!(
            SubscriptionLifecycle::of(&user, test_datetime()),
            SubscriptionLifecycle::Trialing
        );
    }

    #[test]
    fn canceled_with_future_end_is_canceling() {
        let user = create_test_user(|u| {
            u.plan_status = Some(PlanStatus::Canceled);
            u.subscription_ends_at = Some(test_datetime_offset_days(10));
        });
        assert_eq!(
            SubscriptionLifecycle::of(&user, test_datetime()),
            SubscriptionLifecycle::Canceling
        );
        assert_eq!(
            SubscriptionLifecycle::of(&user, test_datetime_offset_days(11)),
            SubscriptionLifecycle::Canceled
        );
    }

    #[test]
    fn past_due_passes_through() {
        let user = create_test_user(|u| {
            u.plan_status = Some(PlanStatus::PastDue);
            u.is_subscribed = true;
        });
        let lifecycle = SubscriptionLifecycle::of(&user, test_datetime());
        assert_eq!(lifecycle.as_str(), "past_due");
    }
}
