//! Scripted billing provider for use case tests.
//!
//! Subscriptions, invoices and payments are seeded by the test. Every call is
//! recorded so tests can assert on what reached the provider. Unknown
//! subscriptions and payments answer with `ProviderResourceMissing`, the way
//! the real provider does.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{
    app_error::{AppError, AppResult},
    application::ports::billing_provider::{
        BillingProvider, CheckoutSession, CheckoutSessionRequest, CustomerId, InvoiceInfo,
        PaymentInfo, PriceSwap, RefundInfo, SubscriptionId, SubscriptionInfo,
    },
    domain::entities::plan_status::PlanStatus,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    CreateCustomer {
        email: String,
        name: String,
    },
    CreateCheckoutSession(CheckoutSessionRequest),
    GetSubscription(String),
    SwapPrice {
        subscription_id: String,
        swap: PriceSwap,
    },
    CancelAtPeriodEnd(String),
    CancelSubscription(String),
    CreateSubscription {
        customer_id: String,
        price_id: String,
    },
    LatestPaidInvoice(String),
    GetPayment(String),
    CreateRefund {
        payment_intent_id: String,
        amount: i64,
    },
}

#[derive(Default)]
pub struct FakeBillingProvider {
    pub subscriptions: Mutex<HashMap<String, SubscriptionInfo>>,
    /// Latest paid invoice per subscription id
    pub invoices: Mutex<HashMap<String, InvoiceInfo>>,
    pub payments: Mutex<HashMap<String, PaymentInfo>>,
    calls: Mutex<Vec<ProviderCall>>,
    failures: Mutex<HashMap<String, AppError>>,
    next_id: AtomicU32,
}

impl FakeBillingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_subscription(&self, sub: SubscriptionInfo) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(sub.subscription_id.to_string(), sub);
    }

    pub fn put_invoice(&self, subscription_id: &str, invoice: InvoiceInfo) {
        self.invoices
            .lock()
            .unwrap()
            .insert(subscription_id.to_string(), invoice);
    }

    pub fn put_payment(&self, payment: PaymentInfo) {
        self.payments
            .lock()
            .unwrap()
            .insert(payment.payment_intent_id.clone(), payment);
    }

    pub fn subscription(&self, subscription_id: &str) -> Option<SubscriptionInfo> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
    }

    /// Make every later call to `method` (the trait method name) fail.
    pub fn fail_on(&self, method: &str, error: AppError) {
        self.failures
            .lock()
            .unwrap()
            .insert(method.to_string(), error);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn last_checkout_request(&self) -> Option<CheckoutSessionRequest> {
        self.calls().into_iter().rev().find_map(|c| match c {
            ProviderCall::CreateCheckoutSession(request) => Some(request),
            _ => None,
        })
    }

    fn record(&self, method: &str, call: ProviderCall) -> AppResult<()> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().get(method) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}_fake_{}", prefix, n)
    }

    fn update_subscription(
        &self,
        subscription_id: &SubscriptionId,
        change: impl FnOnce(&mut SubscriptionInfo),
    ) -> AppResult<SubscriptionInfo> {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let sub = subscriptions
            .get_mut(subscription_id.as_str())
            .ok_or_else(|| missing(subscription_id.as_str()))?;
        change(sub);
        Ok(sub.clone())
    }
}

fn missing(id: &str) -> AppError {
    AppError::ProviderResourceMissing(format!("No such resource: '{}'", id))
}

#[async_trait]
impl BillingProvider for FakeBillingProvider {
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        _metadata: HashMap<String, String>,
    ) -> AppResult<CustomerId> {
        self.record(
            "create_customer",
            ProviderCall::CreateCustomer {
                email: email.to_string(),
                name: name.to_string(),
            },
        )?;
        Ok(CustomerId::new(self.next_id("cus")))
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> AppResult<CheckoutSession> {
        self.record(
            "create_checkout_session",
            ProviderCall::CreateCheckoutSession(request.clone()),
        )?;
        let session_id = self.next_id("cs");
        Ok(CheckoutSession {
            url: Some(format!("https://checkout.test/{}", session_id)),
            session_id,
        })
    }

    async fn get_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<SubscriptionInfo> {
        self.record(
            "get_subscription",
            ProviderCall::GetSubscription(subscription_id.to_string()),
        )?;
        self.subscription(subscription_id.as_str())
            .ok_or_else(|| missing(subscription_id.as_str()))
    }

    async fn swap_subscription_price(
        &self,
        subscription_id: &SubscriptionId,
        swap: &PriceSwap,
    ) -> AppResult<SubscriptionInfo> {
        self.record(
            "swap_subscription_price",
            ProviderCall::SwapPrice {
                subscription_id: subscription_id.to_string(),
                swap: swap.clone(),
            },
        )?;
        self.update_subscription(subscription_id, |sub| {
            sub.price_id = Some(swap.new_price_id.clone());
            if swap.preserve_trial_end.is_some() {
                sub.trial_end = swap.preserve_trial_end;
            }
        })
    }

    async fn cancel_at_period_end(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<SubscriptionInfo> {
        self.record(
            "cancel_at_period_end",
            ProviderCall::CancelAtPeriodEnd(subscription_id.to_string()),
        )?;
        self.update_subscription(subscription_id, |sub| sub.cancel_at_period_end = true)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<SubscriptionInfo> {
        self.record(
            "cancel_subscription",
            ProviderCall::CancelSubscription(subscription_id.to_string()),
        )?;
        self.update_subscription(subscription_id, |sub| sub.status = PlanStatus::Canceled)
    }

    async fn create_subscription(
        &self,
        customer: &CustomerId,
        price_id: &str,
        _metadata: HashMap<String, String>,
    ) -> AppResult<SubscriptionInfo> {
        self.record(
            "create_subscription",
            ProviderCall::CreateSubscription {
                customer_id: customer.to_string(),
                price_id: price_id.to_string(),
            },
        )?;
        let now = Utc::now();
        let sub = SubscriptionInfo {
            subscription_id: SubscriptionId::new(self.next_id("sub")),
            customer_id: customer.clone(),
            status: PlanStatus::Active,
            current_period_start: Some(now),
            current_period_end: Some(now + Duration::days(30)),
            trial_start: None,
            trial_end: None,
            cancel_at_period_end: false,
            price_id: Some(price_id.to_string()),
            subscription_item_id: Some(self.next_id("si")),
        };
        self.put_subscription(sub.clone());
        Ok(sub)
    }

    async fn latest_paid_invoice(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<Option<InvoiceInfo>> {
        self.record(
            "latest_paid_invoice",
            ProviderCall::LatestPaidInvoice(subscription_id.to_string()),
        )?;
        Ok(self
            .invoices
            .lock()
            .unwrap()
            .get(subscription_id.as_str())
            .cloned())
    }

    async fn get_payment(&self, payment_intent_id: &str) -> AppResult<PaymentInfo> {
        self.record(
            "get_payment",
            ProviderCall::GetPayment(payment_intent_id.to_string()),
        )?;
        self.payments
            .lock()
            .unwrap()
            .get(payment_intent_id)
            .cloned()
            .ok_or_else(|| missing(payment_intent_id))
    }

    async fn create_refund(&self, payment_intent_id: &str, amount: i64) -> AppResult<RefundInfo> {
        self.record(
            "create_refund",
            ProviderCall::CreateRefund {
                payment_intent_id: payment_intent_id.to_string(),
                amount,
            },
        )?;
        Ok(RefundInfo {
            refund_id: self.next_id("re"),
            amount,
            status: "succeeded".to_string(),
        })
    }
}
