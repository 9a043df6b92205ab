//! Derivation of local subscription fields from the provider's view.
//!
//! Everything here is a pure function of provider data plus `now`, so the same
//! provider state always produces the same record.

use chrono::{DateTime, Duration, Utc};

use crate::{
    application::ports::billing_provider::SubscriptionInfo,
    domain::entities::{plan_status::PlanStatus, user::SubscriptionUpdate},
};

/// Used when the provider omits the current period end.
pub const FALLBACK_PERIOD_DAYS: i64 = 30;

/// Provider period end, or `now + 30 days` with a warning when it is missing.
pub fn period_end_or_fallback(sub: &SubscriptionInfo, now: DateTime<Utc>) -> DateTime<Utc> {
    match sub.current_period_end {
        Some(end) => end,
        None => {
            tracing::warn!(
                subscription_id = %sub.subscription_id,
                fallback_days = FALLBACK_PERIOD_DAYS,
                "Subscription has no current_period_end, using fallback"
            );
            now + Duration::days(FALLBACK_PERIOD_DAYS)
        }
    }
}

/// Trial window, only when the provider reports both boundaries.
pub fn trial_window(sub: &SubscriptionInfo) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    match (sub.trial_start, sub.trial_end) {
        (Some(start), Some(end)) => Some((start, end)),
        _ => None,
    }
}

/// A trial that consumes the user's one-time trial grant.
pub fn is_real_trial(sub: &SubscriptionInfo) -> bool {
    sub.status.is_trialing() && trial_window(sub).is_some()
}

/// Payment timestamp implied by the provider state. Only an active
/// subscription has been charged for its current period.
pub fn last_payment_at(
    sub: &SubscriptionInfo,
    previous: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    match (&sub.status, sub.current_period_start) {
        (PlanStatus::Active, Some(start)) => Some(start),
        _ => previous,
    }
}

/// Full subscription state after a completed checkout.
pub fn checkout_update(
    sub: &SubscriptionInfo,
    price_id: Option<String>,
    previous_last_payment: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> SubscriptionUpdate {
    let trial = trial_window(sub);
    let real_trial = is_real_trial(sub);

    SubscriptionUpdate {
        stripe_customer_id: Some(sub.customer_id.as_str().to_string()),
        stripe_subscription_id: Some(sub.subscription_id.as_str().to_string()),
        stripe_price_id: price_id.or_else(|| sub.price_id.clone()),
        plan_status: Some(sub.status.clone()),
        is_subscribed: true,
        is_in_trial: real_trial,
        has_used_trial: real_trial,
        trial_starts_at: trial.map(|(start, _)| start),
        trial_ends_at: trial.map(|(_, end)| end),
        subscription_ends_at: Some(period_end_or_fallback(sub, now)),
        last_payment_at: last_payment_at(sub, previous_last_payment),
    }
}

/// Refund for the unused part of a billing period, in minor units.
///
/// `floor(amount_paid * (end - now) / (end - start))`. `now` is clamped into
/// the period, and a degenerate period yields zero.
pub fn prorated_refund_amount(
    amount_paid: i64,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> i64 {
    let total = (period_end - period_start).num_seconds();
    if total <= 0 || amount_paid <= 0 {
        return 0;
    }
    let unused = (period_end - now).num_seconds().clamp(0, total);

    // i128 keeps amount * seconds from overflowing.
    let refund = (amount_paid as i128 * unused as i128) / total as i128;
    refund as i64
}

/// Minor currency units to major units for display.
pub fn minor_to_major(amount: i64) -> f64 {
    amount as f64 / 100.0
}
