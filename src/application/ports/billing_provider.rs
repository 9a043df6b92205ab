use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{app_error::AppResult, domain::entities::plan_status::PlanStatus};

// ============================================================================
// Port Types - Provider-agnostic domain types
// ============================================================================

/// Unique identifier for a customer in the payment provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

impl CustomerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a subscription in the payment provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub String);

impl SubscriptionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the provider needs to open a hosted checkout page.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub customer: CustomerId,
    pub price_id: String,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: String,
    /// Echoed back on the completion event for correlation.
    pub metadata: HashMap<String, String>,
    pub trial_period_days: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: Option<String>,
}

/// Subscription state as seen by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionInfo {
    pub subscription_id: SubscriptionId,
    pub customer_id: CustomerId,
    pub status: PlanStatus,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub trial_start: Option<DateTime<Utc>>,
    pub trial_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    /// Price of the first subscription item
    pub price_id: Option<String>,
    /// First subscription item (needed to swap its price in place)
    pub subscription_item_id: Option<String>,
}

/// Parameters for swapping the price of an existing subscription in place.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSwap {
    pub subscription_item_id: Option<String>,
    pub new_price_id: String,
    /// Trial boundary to keep; `None` means the subscription has no trial.
    pub preserve_trial_end: Option<DateTime<Utc>>,
}

/// A paid invoice of a subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceInfo {
    pub invoice_id: String,
    /// Minor currency units
    pub amount_paid: i64,
    pub currency: String,
    pub payment_intent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInfo {
    pub payment_intent_id: String,
    pub status: String,
    pub amount_received: i64,
}

impl PaymentInfo {
    pub fn succeeded(&self) -> bool {
        self.status == "succeeded"
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefundInfo {
    pub refund_id: String,
    pub amount: i64,
    pub status: String,
}

// ============================================================================
// Billing Provider Port
// ============================================================================

/// Payment provider port. Implementations are injected into every use case;
/// nothing resolves a provider globally.
///
/// Every call is keyed by provider-assigned ids. Implementations must bound
/// each call with a timeout and report a timeout as
/// [`AppError::ProviderTimeout`](crate::app_error::AppError::ProviderTimeout).
/// A missing remote object must surface as
/// [`AppError::ProviderResourceMissing`](crate::app_error::AppError::ProviderResourceMissing).
#[async_trait]
pub trait BillingProvider: Send + Sync {
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        metadata: HashMap<String, String>,
    ) -> AppResult<CustomerId>;

    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> AppResult<CheckoutSession>;

    /// Retrieve a subscription with its line items expanded.
    async fn get_subscription(&self, subscription_id: &SubscriptionId)
    -> AppResult<SubscriptionInfo>;

    async fn swap_subscription_price(
        &self,
        subscription_id: &SubscriptionId,
        swap: &PriceSwap,
    ) -> AppResult<SubscriptionInfo>;

    async fn cancel_at_period_end(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<SubscriptionInfo>;

    async fn cancel_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<SubscriptionInfo>;

    async fn create_subscription(
        &self,
        customer: &CustomerId,
        price_id: &str,
        metadata: HashMap<String, String>,
    ) -> AppResult<SubscriptionInfo>;

    /// Most recent invoice with status `paid` for the subscription, if any.
    async fn latest_paid_invoice(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<Option<InvoiceInfo>>;

    async fn get_payment(&self, payment_intent_id: &str) -> AppResult<PaymentInfo>;

    async fn create_refund(&self, payment_intent_id: &str, amount: i64) -> AppResult<RefundInfo>;
}
