//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use crate::{
    application::{
        plans::{Plan, PlanCatalog},
        ports::billing_provider::{CustomerId, SubscriptionId, SubscriptionInfo},
    },
    domain::entities::{plan_status::PlanStatus, user::UserProfile},
};

/// Create a registered user with no billing history.
pub fn create_test_user(overrides: impl FnOnce(&mut UserProfile)) -> UserProfile {
    let id = Uuid::new_v4();
    let mut user = UserProfile {
        id,
        name: "Test User".to_string(),
        email: format!("user-{}@example.com", id.simple()),
        stripe_customer_id: None,
        stripe_subscription_id: None,
        stripe_price_id: None,
        plan_status: None,
        is_subscribed: false,
        is_in_trial: false,
        has_used_trial: false,
        trial_starts_at: None,
        trial_ends_at: None,
        subscription_ends_at: None,
        last_payment_at: None,
        created_at: Some(test_datetime()),
        updated_at: Some(test_datetime()),
    };
    overrides(&mut user);
    user
}

/// Create an active, paid provider subscription with a 30 day period
/// starting at [`test_datetime`].
pub fn create_test_subscription_info(
    overrides: impl FnOnce(&mut SubscriptionInfo),
) -> SubscriptionInfo {
    let mut sub = SubscriptionInfo {
        subscription_id: SubscriptionId::new("sub_test"),
        customer_id: CustomerId::new("cus_test"),
        status: PlanStatus::Active,
        current_period_start: Some(test_datetime()),
        current_period_end: Some(test_datetime_offset_days(30)),
        trial_start: None,
        trial_end: None,
        cancel_at_period_end: false,
        price_id: Some("price_premium".to_string()),
        subscription_item_id: Some("si_test".to_string()),
    };
    overrides(&mut sub);
    sub
}

/// Catalog with basic (trial eligible, 7 days), premium, and advanced plans.
pub fn create_test_plan_catalog() -> PlanCatalog {
    let plan = |code: &str, name: &str| Plan {
        code: code.to_string(),
        name: name.to_string(),
        price_id: format!("price_{}", code),
    };
    PlanCatalog::new(
        vec![
            plan("basic", "Basic Plan"),
            plan("premium", "Premium Plan"),
            plan("advanced", "Advanced Plan"),
        ],
        Some("price_basic".to_string()),
        7,
    )
}

/// Fixed instant all fixtures are relative to: 2024-01-15 12:00:00 UTC.
pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap()
}

pub fn test_datetime_offset_days(days: i64) -> DateTime<Utc> {
    test_datetime() + Duration::days(days)
}
