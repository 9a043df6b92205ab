use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::billing_provider::{
        BillingProvider, CheckoutSession, CheckoutSessionRequest, CustomerId, InvoiceInfo,
        PaymentInfo, PriceSwap, RefundInfo, SubscriptionId, SubscriptionInfo,
    },
    domain::entities::plan_status::PlanStatus,
    infra::stripe_client::{CheckoutSessionParams, StripeClient, StripeSubscription},
};

/// Adapter that wraps StripeClient to implement BillingProvider.
#[derive(Clone)]
pub struct StripeBillingAdapter {
    client: StripeClient,
}

impl StripeBillingAdapter {
    pub fn new(client: StripeClient) -> Self {
        Self { client }
    }

    /// Convert optional timestamp to Option<DateTime<Utc>>
    fn opt_timestamp_to_datetime(ts: Option<i64>) -> Option<DateTime<Utc>> {
        ts.and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }

    fn to_subscription_info(sub: StripeSubscription) -> SubscriptionInfo {
        let item = sub.first_item();
        SubscriptionInfo {
            subscription_id: SubscriptionId::new(&sub.id),
            customer_id: CustomerId::new(&sub.customer),
            status: PlanStatus::from_provider(&sub.status),
            current_period_start: Self::opt_timestamp_to_datetime(sub.period_start()),
            current_period_end: Self::opt_timestamp_to_datetime(sub.period_end()),
            trial_start: Self::opt_timestamp_to_datetime(sub.trial_start),
            trial_end: Self::opt_timestamp_to_datetime(sub.trial_end),
            cancel_at_period_end: sub.cancel_at_period_end,
            price_id: item.map(|i| i.price.id.clone()),
            subscription_item_id: item.map(|i| i.id.clone()),
        }
    }
}

#[async_trait]
impl BillingProvider for StripeBillingAdapter {
    async fn create_customer(
        &self,
        email: &str,
        name: &str,
        metadata: HashMap<String, String>,
    ) -> AppResult<CustomerId> {
        let customer = self.client.create_customer(email, name, metadata).await?;
        tracing::info!(customer_id = %customer.id, "Created Stripe customer");
        Ok(CustomerId::new(customer.id))
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> AppResult<CheckoutSession> {
        let session = self
            .client
            .create_checkout_session(&CheckoutSessionParams {
                customer_id: request.customer.as_str(),
                price_id: &request.price_id,
                success_url: &request.success_url,
                cancel_url: &request.cancel_url,
                client_reference_id: &request.client_reference_id,
                metadata: &request.metadata,
                trial_period_days: request.trial_period_days,
            })
            .await?;

        Ok(CheckoutSession {
            session_id: session.id,
            url: session.url,
        })
    }

    async fn get_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<SubscriptionInfo> {
        let sub = self.client.get_subscription(subscription_id.as_str()).await?;
        Ok(Self::to_subscription_info(sub))
    }

    async fn swap_subscription_price(
        &self,
        subscription_id: &SubscriptionId,
        swap: &PriceSwap,
    ) -> AppResult<SubscriptionInfo> {
        let item_id = match &swap.subscription_item_id {
            Some(id) => id.clone(),
            None => self
                .get_subscription(subscription_id)
                .await?
                .subscription_item_id
                .ok_or_else(|| {
                    AppError::PaymentProvider(format!(
                        "Subscription {} has no items",
                        subscription_id
                    ))
                })?,
        };

        let sub = self
            .client
            .update_subscription_price(
                subscription_id.as_str(),
                &item_id,
                &swap.new_price_id,
                swap.preserve_trial_end.map(|t| t.timestamp()),
            )
            .await?;
        Ok(Self::to_subscription_info(sub))
    }

    async fn cancel_at_period_end(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<SubscriptionInfo> {
        let sub = self
            .client
            .cancel_subscription(subscription_id.as_str(), true)
            .await?;
        Ok(Self::to_subscription_info(sub))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<SubscriptionInfo> {
        let sub = self
            .client
            .cancel_subscription(subscription_id.as_str(), false)
            .await?;
        Ok(Self::to_subscription_info(sub))
    }

    async fn create_subscription(
        &self,
        customer: &CustomerId,
        price_id: &str,
        metadata: HashMap<String, String>,
    ) -> AppResult<SubscriptionInfo> {
        let sub = self
            .client
            .create_subscription(customer.as_str(), price_id, &metadata)
            .await?;
        Ok(Self::to_subscription_info(sub))
    }

    async fn latest_paid_invoice(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<Option<InvoiceInfo>> {
        let invoice = self
            .client
            .latest_paid_invoice(subscription_id.as_str())
            .await?;

        Ok(invoice.map(|inv| InvoiceInfo {
            invoice_id: inv.id,
            amount_paid: inv.amount_paid,
            currency: inv.currency,
            payment_intent_id: inv.payment_intent,
        }))
    }

    async fn get_payment(&self, payment_intent_id: &str) -> AppResult<PaymentInfo> {
        let intent = self.client.get_payment_intent(payment_intent_id).await?;
        Ok(PaymentInfo {
            payment_intent_id: intent.id,
            status: intent.status,
            amount_received: intent.amount_received,
        })
    }

    async fn create_refund(&self, payment_intent_id: &str, amount: i64) -> AppResult<RefundInfo> {
        let refund = self.client.create_refund(payment_intent_id, amount).await?;
        Ok(RefundInfo {
            refund_id: refund.id,
            amount: refund.amount,
            status: refund.status.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_subscription_with_item_level_period() {
        let sub: StripeSubscription = serde_json::from_value(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "trialing",
            "trial_start": 1_705_320_000,
            "trial_end": 1_705_924_800,
            "items": { "data": [{
                "id": "si_1",
                "price": { "id": "price_basic" },
                "current_period_start": 1_705_320_000,
                "current_period_end": 1_705_924_800
            }] }
        }))
        .unwrap();

        let info = StripeBillingAdapter::to_subscription_info(sub);

        assert_eq!(info.status, PlanStatus::Trialing);
        assert_eq!(info.price_id.as_deref(), Some("price_basic"));
        assert_eq!(info.subscription_item_id.as_deref(), Some("si_1"));
        assert_eq!(
            info.current_period_end,
            Utc.timestamp_opt(1_705_924_800, 0).single()
        );
        assert_eq!(info.trial_end, info.current_period_end);
    }

    #[test]
    fn unknown_status_is_kept_verbatim() {
        let sub: StripeSubscription = serde_json::from_value(json!({
            "id": "sub_1",
            "customer": "cus_1",
            "status": "some_future_status",
            "items": { "data": [] }
        }))
        .unwrap();

        let info = StripeBillingAdapter::to_subscription_info(sub);

        assert_eq!(info.status.as_str(), "some_future_status");
        assert_eq!(info.current_period_end, None);
        assert_eq!(info.price_id, None);
    }
}
