use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::plan_status::PlanStatus;

/// A user record together with its billing fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub plan_status: Option<PlanStatus>,
    pub is_subscribed: bool,
    pub is_in_trial: bool,
    /// Never goes back to false once set.
    pub has_used_trial: bool,
    pub trial_starts_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Current subscription fields, as a starting point for a full rewrite.
    pub fn subscription_fields(&self) -> SubscriptionUpdate {
        SubscriptionUpdate {
            stripe_customer_id: self.stripe_customer_id.clone(),
            stripe_subscription_id: self.stripe_subscription_id.clone(),
            stripe_price_id: self.stripe_price_id.clone(),
            plan_status: self.plan_status.clone(),
            is_subscribed: self.is_subscribed,
            is_in_trial: self.is_in_trial,
            has_used_trial: self.has_used_trial,
            trial_starts_at: self.trial_starts_at,
            trial_ends_at: self.trial_ends_at,
            subscription_ends_at: self.subscription_ends_at,
            last_payment_at: self.last_payment_at,
        }
    }

    /// Trial as far as the local record knows.
    pub fn is_in_trial_locally(&self) -> bool {
        self.is_in_trial || self.plan_status.as_ref().is_some_and(PlanStatus::is_trialing)
    }

    /// Whether the user can use paid features at `now`.
    ///
    /// A paid subscription canceled at period end keeps access until
    /// `subscription_ends_at`.
    pub fn has_access(&self, now: DateTime<Utc>) -> bool {
        match &self.plan_status {
            Some(PlanStatus::Active) | Some(PlanStatus::Trialing) => self.is_subscribed,
            Some(PlanStatus::Canceled) => self.subscription_ends_at.is_some_and(|end| end > now),
            _ => false,
        }
    }
}

/// Full set of subscription fields written atomically to the user store.
///
/// Every write carries the complete derived state so that replays and
/// out-of-order deliveries converge on the same record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SubscriptionUpdate {
    /// `None` keeps the stored customer id.
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub plan_status: Option<PlanStatus>,
    pub is_subscribed: bool,
    pub is_in_trial: bool,
    /// OR-merged with the stored value.
    pub has_used_trial: bool,
    pub trial_starts_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub last_payment_at: Option<DateTime<Utc>>,
}

impl SubscriptionUpdate {
    /// Drop the link to the provider subscription and any trial window.
    pub fn clear_subscription(mut self) -> Self {
        self.stripe_subscription_id = None;
        self.stripe_price_id = None;
        self.is_subscribed = false;
        self.is_in_trial = false;
        self.trial_starts_at = None;
        self.trial_ends_at = None;
        self
    }

    /// State after a trial is terminated: nothing left, trial consumed.
    pub fn trial_terminated(self) -> Self {
        let mut update = self.clear_subscription();
        update.plan_status = None;
        update.subscription_ends_at = None;
        update.has_used_trial = true;
        update
    }

    /// State after a paid subscription is scheduled to end. The access-until
    /// date in `subscription_ends_at` is kept.
    pub fn paid_cancellation_scheduled(self) -> Self {
        let mut update = self.clear_subscription();
        update.plan_status = Some(PlanStatus::Canceled);
        update
    }

    /// Apply to a profile the way the store does.
    pub fn apply_to(&self, user: &mut UserProfile) {
        if let Some(customer_id) = &self.stripe_customer_id {
            user.stripe_customer_id = Some(customer_id.clone());
        }
        user.stripe_subscription_id = self.stripe_subscription_id.clone();
        user.stripe_price_id = self.stripe_price_id.clone();
        user.plan_status = self.plan_status.clone();
        user.is_subscribed = self.is_subscribed;
        user.is_in_trial = self.is_in_trial;
        user.has_used_trial = user.has_used_trial || self.has_used_trial;
        user.trial_starts_at = self.trial_starts_at;
        user.trial_ends_at = self.trial_ends_at;
        user.subscription_ends_at = self.subscription_ends_at;
        user.last_payment_at = self.last_payment_at;
    }
}
