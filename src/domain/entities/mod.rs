pub mod billing_event;
pub mod plan_status;
pub mod subscription_lifecycle;
pub mod user;
