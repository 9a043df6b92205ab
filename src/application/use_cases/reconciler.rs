use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        helpers::subscription_fields::{
            checkout_update, is_real_trial, last_payment_at, period_end_or_fallback, trial_window,
        },
        ports::billing_provider::{BillingProvider, SubscriptionId},
    },
    domain::entities::{
        billing_event::{
            BillingEvent, CheckoutCompleted, EventEnvelope, SubscriptionRef, parse_delivery,
        },
        plan_status::PlanStatus,
        user::UserProfile,
    },
    infra::webhook_signer::verify_webhook_signature,
};

use super::user::UserRepo;

/// Side effect for the provider's advance notice that a trial ends soon.
#[async_trait]
pub trait TrialNotifier: Send + Sync {
    async fn notify_trial_ending(
        &self,
        user: &UserProfile,
        trial_end: Option<DateTime<Utc>>,
    ) -> AppResult<()>;
}

/// Default notifier: records the notice in the log.
pub struct LoggingTrialNotifier;

#[async_trait]
impl TrialNotifier for LoggingTrialNotifier {
    async fn notify_trial_ending(
        &self,
        user: &UserProfile,
        trial_end: Option<DateTime<Utc>>,
    ) -> AppResult<()> {
        tracing::info!(
            user_id = %user.id,
            trial_end = ?trial_end.or(user.trial_ends_at),
            "Trial ending soon"
        );
        Ok(())
    }
}

#[derive(Clone)]
pub struct WebhookSettings {
    pub secret: SecretString,
    pub tolerance_secs: i64,
}

/// Acknowledgment returned to the provider once the signature verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryAck {
    pub received: bool,
    pub events: usize,
    #[serde(skip)]
    pub failed: usize,
}

/// Drives local subscription state from provider webhook events.
///
/// Every handler recomputes the full derived state from the provider's
/// current view, so replays and out-of-order deliveries converge.
#[derive(Clone)]
pub struct SubscriptionReconciler {
    users: Arc<dyn UserRepo>,
    provider: Arc<dyn BillingProvider>,
    notifier: Arc<dyn TrialNotifier>,
    webhook: WebhookSettings,
}

impl SubscriptionReconciler {
    pub fn new(
        users: Arc<dyn UserRepo>,
        provider: Arc<dyn BillingProvider>,
        notifier: Arc<dyn TrialNotifier>,
        webhook: WebhookSettings,
    ) -> Self {
        Self {
            users,
            provider,
            notifier,
            webhook,
        }
    }

    /// Verify and process one webhook delivery.
    ///
    /// Only a bad signature or an unreadable envelope fails the delivery.
    /// Per-event failures are logged and counted.
    #[instrument(skip(self, payload, signature))]
    pub async fn handle_delivery(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> AppResult<DeliveryAck> {
        let signature = signature.ok_or_else(|| {
            AppError::SignatureVerification("Missing stripe-signature header".into())
        })?;
        let now = Utc::now();

        verify_webhook_signature(
            payload,
            signature,
            self.webhook.secret.expose_secret(),
            self.webhook.tolerance_secs,
            now.timestamp(),
        )?;

        let body = std::str::from_utf8(payload)
            .map_err(|_| AppError::InvalidInput("Webhook payload is not UTF-8".into()))?;
        let envelopes = parse_delivery(body)?;

        let mut failed = 0;
        for envelope in &envelopes {
            if let Err(e) = self.process_event(envelope, now).await {
                failed += 1;
                tracing::error!(
                    error = %e,
                    event_id = %envelope.id,
                    event_type = %envelope.event_type,
                    "Failed to process webhook event"
                );
            }
        }

        Ok(DeliveryAck {
            received: true,
            events: envelopes.len(),
            failed,
        })
    }

    /// Decode and apply a single event.
    pub async fn process_event(&self, envelope: &EventEnvelope, now: DateTime<Utc>) -> AppResult<()> {
        tracing::info!(
            event_id = %envelope.id,
            event_type = %envelope.event_type,
            "Processing webhook event"
        );

        match BillingEvent::decode(envelope)? {
            BillingEvent::CheckoutCompleted(session) => {
                self.on_checkout_completed(&session, now).await
            }
            BillingEvent::TrialWillEnd(sub) => self.on_trial_will_end(&sub).await,
            BillingEvent::SubscriptionUpdated(sub) => self.on_subscription_updated(&sub, now).await,
            BillingEvent::SubscriptionDeleted(sub) => self.on_subscription_deleted(&sub).await,
            BillingEvent::Ignored => {
                tracing::debug!(event_type = %envelope.event_type, "Unhandled event type");
                Ok(())
            }
        }
    }

    async fn on_checkout_completed(
        &self,
        session: &CheckoutCompleted,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let user_id = correlate_user(session)?;
        let subscription_id = session.subscription_id.as_deref().ok_or_else(|| {
            AppError::DataIntegrity(format!(
                "Checkout session {} has no subscription",
                session.session_id
            ))
        })?;

        let sub = self
            .provider
            .get_subscription(&SubscriptionId::new(subscription_id))
            .await?;

        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if is_real_trial(&sub) {
            // Committed on its own so a failed main update cannot re-grant a trial.
            if let Err(e) = self.users.mark_trial_used(user_id).await {
                tracing::error!(error = %e, user_id = %user_id, "Failed to mark trial as used");
            }
        }

        let update = checkout_update(
            &sub,
            session.metadata_price_id().map(str::to_string),
            user.last_payment_at,
            now,
        );
        self.users.update_subscription(user_id, &update).await?;

        tracing::info!(
            user_id = %user_id,
            subscription_id = %sub.subscription_id,
            status = %sub.status,
            trial = update.is_in_trial,
            "Checkout completed"
        );
        Ok(())
    }

    async fn on_trial_will_end(&self, sub: &SubscriptionRef) -> AppResult<()> {
        let Some(user) = self.users.get_by_subscription_id(&sub.subscription_id).await? else {
            tracing::info!(subscription_id = %sub.subscription_id, "Trial ending for unknown subscription");
            return Ok(());
        };

        if let Err(e) = self.notifier.notify_trial_ending(&user, sub.trial_end).await {
            tracing::warn!(error = %e, user_id = %user.id, "Trial ending notification failed");
        }
        Ok(())
    }

    async fn on_subscription_updated(
        &self,
        event_sub: &SubscriptionRef,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let Some(user) = self
            .users
            .get_by_subscription_id(&event_sub.subscription_id)
            .await?
        else {
            tracing::info!(
                subscription_id = %event_sub.subscription_id,
                "No user for updated subscription, ignoring"
            );
            return Ok(());
        };

        let sub = match self
            .provider
            .get_subscription(&SubscriptionId::new(&event_sub.subscription_id))
            .await
        {
            Ok(sub) => sub,
            Err(AppError::ProviderResourceMissing(_)) => {
                tracing::info!(
                    subscription_id = %event_sub.subscription_id,
                    "Updated subscription no longer exists, ignoring"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut update = user.subscription_fields();
        update.plan_status = Some(sub.status.clone());
        update.subscription_ends_at = Some(period_end_or_fallback(&sub, now));
        update.is_in_trial = is_real_trial(&sub);
        // Any observed trial consumes the one-time grant.
        update.has_used_trial |= update.is_in_trial;
        if let Some((start, end)) = trial_window(&sub) {
            update.trial_starts_at = Some(start);
            update.trial_ends_at = Some(end);
        }
        update.last_payment_at = last_payment_at(&sub, user.last_payment_at);
        if let Some(price_id) = &sub.price_id {
            update.stripe_price_id = Some(price_id.clone());
        }

        self.users.update_subscription(user.id, &update).await?;

        tracing::info!(
            user_id = %user.id,
            subscription_id = %sub.subscription_id,
            status = %sub.status,
            "Subscription updated"
        );
        Ok(())
    }

    async fn on_subscription_deleted(&self, sub: &SubscriptionRef) -> AppResult<()> {
        let Some(user) = self.users.get_by_subscription_id(&sub.subscription_id).await? else {
            tracing::info!(
                subscription_id = %sub.subscription_id,
                "No user for deleted subscription, ignoring"
            );
            return Ok(());
        };

        let mut update = user.subscription_fields().clear_subscription();
        update.plan_status = Some(PlanStatus::Canceled);
        self.users.update_subscription(user.id, &update).await?;

        tracing::info!(
            user_id = %user.id,
            subscription_id = %sub.subscription_id,
            "Subscription deleted"
        );
        Ok(())
    }
}

/// User id from the session metadata. `client_reference_id`, when present,
/// must agree with it.
fn correlate_user(session: &CheckoutCompleted) -> AppResult<Uuid> {
    let raw = session.metadata_user_id().ok_or_else(|| {
        AppError::DataIntegrity(format!(
            "Checkout session {} has no userId metadata",
            session.session_id
        ))
    })?;

    if let Some(reference) = session.client_reference_id.as_deref()
        && !reference.is_empty()
        && reference != raw
    {
        return Err(AppError::DataIntegrity(format!(
            "Checkout session {} metadata userId does not match client_reference_id",
            session.session_id
        )));
    }

    Uuid::parse_str(raw).map_err(|_| {
        AppError::DataIntegrity(format!(
            "Checkout session {} has malformed userId metadata",
            session.session_id
        ))
    })
}
