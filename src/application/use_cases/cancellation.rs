use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::billing_provider::{BillingProvider, SubscriptionId},
    domain::entities::user::UserProfile,
};

use super::user::UserRepo;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationStatus {
    /// Trial canceled immediately.
    TrialEnded,
    /// Paid subscription ends with the current billing period.
    CancelScheduled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationResult {
    pub status: CancellationStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_until: Option<DateTime<Utc>>,
    /// The provider no longer knew the subscription; only local state changed.
    pub remote_already_gone: bool,
}

/// What happened at the provider.
struct RemoteCancellation {
    in_trial: bool,
    access_until: Option<DateTime<Utc>>,
    already_gone: bool,
}

#[derive(Clone)]
pub struct CancellationUseCases {
    users: Arc<dyn UserRepo>,
    provider: Arc<dyn BillingProvider>,
}

impl CancellationUseCases {
    pub fn new(users: Arc<dyn UserRepo>, provider: Arc<dyn BillingProvider>) -> Self {
        Self { users, provider }
    }

    /// Cancel the user's subscription. Trials end now and consume the
    /// user's trial; paid subscriptions run to the end of the period.
    ///
    /// A subscription the provider no longer knows is cleared locally and
    /// reported as success.
    #[instrument(skip(self))]
    pub async fn cancel(&self, user_id: Uuid) -> AppResult<CancellationResult> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let subscription_id = user
            .stripe_subscription_id
            .clone()
            .map(SubscriptionId::new)
            .ok_or(AppError::NoActiveSubscription)?;

        let remote = match self.cancel_remote(&user, &subscription_id).await {
            Ok(remote) => remote,
            Err(AppError::ProviderResourceMissing(_)) => {
                tracing::warn!(
                    user_id = %user.id,
                    subscription_id = %subscription_id,
                    "Subscription already gone at provider, clearing local state"
                );
                RemoteCancellation {
                    in_trial: user.is_in_trial_locally(),
                    access_until: None,
                    already_gone: true,
                }
            }
            Err(e) => {
                tracing::error!(error = %e, user_id = %user.id, "Error canceling subscription");
                return Err(AppError::Cancellation(e.to_string()));
            }
        };

        self.record_cancellation(&user, &remote)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id = %user.id, "Error saving cancellation");
                AppError::Cancellation(e.to_string())
            })
    }

    async fn cancel_remote(
        &self,
        user: &UserProfile,
        subscription_id: &SubscriptionId,
    ) -> AppResult<RemoteCancellation> {
        let sub = self.provider.get_subscription(subscription_id).await?;
        let in_trial = user.is_in_trial_locally() || sub.status.is_trialing();

        if in_trial {
            if !sub.status.is_canceled() {
                self.provider.cancel_subscription(subscription_id).await?;
            }
            return Ok(RemoteCancellation {
                in_trial,
                access_until: None,
                already_gone: false,
            });
        }

        // A canceled subscription rejects further cancellation requests.
        let access_until = if sub.status.is_canceled() || sub.cancel_at_period_end {
            sub.current_period_end
        } else {
            self.provider
                .cancel_at_period_end(subscription_id)
                .await?
                .current_period_end
        };

        Ok(RemoteCancellation {
            in_trial,
            access_until,
            already_gone: false,
        })
    }

    async fn record_cancellation(
        &self,
        user: &UserProfile,
        remote: &RemoteCancellation,
    ) -> AppResult<CancellationResult> {
        if remote.in_trial {
            let update = user.subscription_fields().trial_terminated();
            self.users.update_subscription(user.id, &update).await?;
            tracing::info!(user_id = %user.id, "Trial ended");

            return Ok(CancellationResult {
                status: CancellationStatus::TrialEnded,
                message: "Your trial has ended and the subscription was canceled.".into(),
                access_until: None,
                remote_already_gone: remote.already_gone,
            });
        }

        let mut update = user.subscription_fields().paid_cancellation_scheduled();
        update.subscription_ends_at = update.subscription_ends_at.or(remote.access_until);
        self.users.update_subscription(user.id, &update).await?;

        let access_until = remote.access_until.or(user.subscription_ends_at);
        tracing::info!(user_id = %user.id, access_until = ?access_until, "Cancellation scheduled");

        Ok(CancellationResult {
            status: CancellationStatus::CancelScheduled,
            message: "Your subscription will be canceled at the end of the billing period."
                .into(),
            access_until,
            remote_already_gone: remote.already_gone,
        })
    }
}
