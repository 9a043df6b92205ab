use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        helpers::subscription_fields::{
            last_payment_at, minor_to_major, period_end_or_fallback, prorated_refund_amount,
        },
        plans::PlanCatalog,
        ports::billing_provider::{BillingProvider, PriceSwap, SubscriptionId, SubscriptionInfo},
    },
    domain::entities::{
        billing_event::{METADATA_PRICE_ID, METADATA_USER_ID},
        plan_status::PlanStatus,
        user::{SubscriptionUpdate, UserProfile},
    },
};

use super::user::UserRepo;

#[derive(Debug, Clone)]
pub struct PlanChangeInput {
    pub user_id: Uuid,
    pub new_plan_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefundSummary {
    /// Major currency units
    pub amount: f64,
    pub currency: String,
    #[serde(skip)]
    pub amount_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanChangeResult {
    pub subscription_id: String,
    pub status: PlanStatus,
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund: Option<RefundSummary>,
}

/// Moves a subscriber to another plan.
///
/// A trial swaps the price in place and keeps its end date. A paid
/// subscription is refunded for unused time, canceled, and replaced by a new
/// subscription with a fresh billing period. The local record is written
/// last, only after every provider call succeeded.
#[derive(Clone)]
pub struct PlanChangeUseCases {
    users: Arc<dyn UserRepo>,
    provider: Arc<dyn BillingProvider>,
    plans: Arc<PlanCatalog>,
}

impl PlanChangeUseCases {
    pub fn new(
        users: Arc<dyn UserRepo>,
        provider: Arc<dyn BillingProvider>,
        plans: Arc<PlanCatalog>,
    ) -> Self {
        Self {
            users,
            provider,
            plans,
        }
    }

    pub async fn change_plan(&self, input: &PlanChangeInput) -> AppResult<PlanChangeResult> {
        self.change_plan_at(input, Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn change_plan_at(
        &self,
        input: &PlanChangeInput,
        now: DateTime<Utc>,
    ) -> AppResult<PlanChangeResult> {
        if !self.plans.is_known(&input.new_plan_id) {
            return Err(AppError::InvalidInput(format!(
                "Unknown plan '{}'",
                input.new_plan_id
            )));
        }

        let user = self
            .users
            .get_by_id(input.user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let subscription_id = user
            .stripe_subscription_id
            .clone()
            .map(SubscriptionId::new)
            .ok_or(AppError::NoActiveSubscription)?;

        if user.stripe_price_id.as_deref() == Some(input.new_plan_id.as_str()) {
            return Err(AppError::InvalidInput(
                "Already subscribed to this plan".into(),
            ));
        }

        self.execute(&user, &subscription_id, &input.new_plan_id, now)
            .await
            .map_err(|e| match e {
                AppError::NoActiveSubscription => e,
                e => {
                    tracing::error!(error = %e, user_id = %user.id, "Error changing plan");
                    AppError::PlanChange(e.to_string())
                }
            })
    }

    async fn execute(
        &self,
        user: &UserProfile,
        subscription_id: &SubscriptionId,
        new_plan_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<PlanChangeResult> {
        let current = self.provider.get_subscription(subscription_id).await?;

        // Checked before any refund: a canceled subscription cannot be replaced.
        if current.status.is_canceled() || current.cancel_at_period_end {
            tracing::warn!(
                user_id = %user.id,
                subscription_id = %current.subscription_id,
                status = %current.status,
                cancel_at_period_end = current.cancel_at_period_end,
                "Plan change rejected, subscription is canceled or canceling"
            );
            return Err(AppError::NoActiveSubscription);
        }

        if user.is_in_trial || current.status.is_trialing() {
            self.change_during_trial(user, &current, new_plan_id).await
        } else {
            self.replace_paid_subscription(user, &current, new_plan_id, now)
                .await
        }
    }

    async fn change_during_trial(
        &self,
        user: &UserProfile,
        current: &SubscriptionInfo,
        new_plan_id: &str,
    ) -> AppResult<PlanChangeResult> {
        let swap = PriceSwap {
            subscription_item_id: current.subscription_item_id.clone(),
            new_price_id: new_plan_id.to_string(),
            preserve_trial_end: current.trial_end.or(user.trial_ends_at),
        };
        let swapped = self
            .provider
            .swap_subscription_price(&current.subscription_id, &swap)
            .await?;

        let mut update = user.subscription_fields();
        update.stripe_price_id = Some(new_plan_id.to_string());
        self.users.update_subscription(user.id, &update).await?;

        tracing::info!(
            user_id = %user.id,
            subscription_id = %swapped.subscription_id,
            new_plan_id,
            "Trial plan changed in place"
        );

        Ok(PlanChangeResult {
            subscription_id: swapped.subscription_id.to_string(),
            status: swapped.status,
            current_period_end: swapped.current_period_end,
            refund: None,
        })
    }

    async fn replace_paid_subscription(
        &self,
        user: &UserProfile,
        current: &SubscriptionInfo,
        new_plan_id: &str,
        now: DateTime<Utc>,
    ) -> AppResult<PlanChangeResult> {
        let refund = self.refund_unused_time(current, now).await?;

        self.provider
            .cancel_subscription(&current.subscription_id)
            .await?;

        let metadata = HashMap::from([
            (METADATA_USER_ID.to_string(), user.id.to_string()),
            (METADATA_PRICE_ID.to_string(), new_plan_id.to_string()),
        ]);
        let created = self
            .provider
            .create_subscription(&current.customer_id, new_plan_id, metadata)
            .await?;

        let update = replacement_update(user, &created, new_plan_id, now);
        self.users.update_subscription(user.id, &update).await?;

        tracing::info!(
            user_id = %user.id,
            old_subscription_id = %current.subscription_id,
            new_subscription_id = %created.subscription_id,
            refund_minor = refund.as_ref().map(|r| r.amount_minor).unwrap_or(0),
            "Paid plan replaced"
        );

        Ok(PlanChangeResult {
            subscription_id: created.subscription_id.to_string(),
            status: created.status,
            current_period_end: created.current_period_end,
            refund,
        })
    }

    /// Refund the unused part of the current period against the latest paid
    /// invoice. `None` when nothing was refunded.
    async fn refund_unused_time(
        &self,
        current: &SubscriptionInfo,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RefundSummary>> {
        let Some(invoice) = self
            .provider
            .latest_paid_invoice(&current.subscription_id)
            .await?
        else {
            tracing::info!(subscription_id = %current.subscription_id, "No paid invoice, skipping refund");
            return Ok(None);
        };

        let Some(payment_intent_id) = invoice.payment_intent_id.as_deref() else {
            tracing::info!(invoice_id = %invoice.invoice_id, "Invoice has no payment, skipping refund");
            return Ok(None);
        };

        let payment = self.provider.get_payment(payment_intent_id).await?;
        if !payment.succeeded() {
            tracing::info!(
                payment_intent_id,
                status = %payment.status,
                "Payment did not succeed, skipping refund"
            );
            return Ok(None);
        }

        let (Some(start), Some(end)) = (current.current_period_start, current.current_period_end)
        else {
            tracing::warn!(
                subscription_id = %current.subscription_id,
                "Subscription has no billing period, skipping refund"
            );
            return Ok(None);
        };

        let amount = prorated_refund_amount(invoice.amount_paid, start, end, now);
        if amount == 0 {
            return Ok(None);
        }

        let refund = self.provider.create_refund(payment_intent_id, amount).await?;
        tracing::info!(
            refund_id = %refund.refund_id,
            amount,
            currency = %invoice.currency,
            "Prorated refund issued"
        );

        Ok(Some(RefundSummary {
            amount: minor_to_major(amount),
            currency: invoice.currency,
            amount_minor: amount,
        }))
    }
}

/// Local state pointing at the replacement subscription.
fn replacement_update(
    user: &UserProfile,
    created: &SubscriptionInfo,
    new_plan_id: &str,
    now: DateTime<Utc>,
) -> SubscriptionUpdate {
    let mut update = user.subscription_fields();
    update.stripe_subscription_id = Some(created.subscription_id.to_string());
    update.stripe_price_id = Some(new_plan_id.to_string());
    update.plan_status = Some(created.status.clone());
    update.is_subscribed = true;
    update.is_in_trial = false;
    update.subscription_ends_at = Some(period_end_or_fallback(created, now));
    update.last_payment_at = last_payment_at(created, user.last_payment_at);
    update
}
