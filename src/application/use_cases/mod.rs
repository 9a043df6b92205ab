pub mod cancellation;
pub mod checkout;
pub mod plan_change;
pub mod reconciler;
pub mod user;
