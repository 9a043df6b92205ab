use std::{collections::HashMap, sync::Arc};

use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        plans::PlanCatalog,
        ports::billing_provider::{BillingProvider, CheckoutSessionRequest, CustomerId},
        validators::is_valid_provider_id,
    },
    domain::entities::{
        billing_event::{METADATA_PRICE_ID, METADATA_USER_ID},
        user::UserProfile,
    },
};

use super::user::UserRepo;

#[derive(Debug, Clone)]
pub struct CheckoutInput {
    pub user_id: Uuid,
    pub plan_id: String,
    pub is_changing_plan: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutResult {
    pub url: String,
    #[serde(skip)]
    pub session_id: String,
    #[serde(skip)]
    pub trial_granted: bool,
}

/// Redirect targets after the hosted checkout page.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

/// Starts subscription purchases. Writes nothing locally: the customer id and
/// subscription fields are persisted by the reconciler once the provider
/// reports the checkout as completed.
#[derive(Clone)]
pub struct CheckoutUseCases {
    users: Arc<dyn UserRepo>,
    provider: Arc<dyn BillingProvider>,
    plans: Arc<PlanCatalog>,
    urls: CheckoutUrls,
}

impl CheckoutUseCases {
    pub fn new(
        users: Arc<dyn UserRepo>,
        provider: Arc<dyn BillingProvider>,
        plans: Arc<PlanCatalog>,
        urls: CheckoutUrls,
    ) -> Self {
        Self {
            users,
            provider,
            plans,
            urls,
        }
    }

    #[instrument(skip(self))]
    pub async fn create_checkout_session(&self, input: &CheckoutInput) -> AppResult<CheckoutResult> {
        if !is_valid_provider_id(&input.plan_id) || !self.plans.is_known(&input.plan_id) {
            return Err(AppError::InvalidInput(format!(
                "Unknown plan '{}'",
                input.plan_id
            )));
        }

        let user = self
            .users
            .get_by_id(input.user_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let grant_trial = self.is_trial_granted(&user, &input.plan_id, input.is_changing_plan);

        self.start_checkout(&user, &input.plan_id, grant_trial)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id = %user.id, "Error creating checkout session");
                match e {
                    e if e.is_provider_error() => AppError::PaymentProvider(e.to_string()),
                    other => other,
                }
            })
    }

    /// Trial only for the designated plan, only once per user, and never for
    /// a plan change.
    fn is_trial_granted(&self, user: &UserProfile, plan_id: &str, is_changing_plan: bool) -> bool {
        self.plans.is_trial_eligible_plan(plan_id) && !user.has_used_trial && !is_changing_plan
    }

    async fn start_checkout(
        &self,
        user: &UserProfile,
        plan_id: &str,
        grant_trial: bool,
    ) -> AppResult<CheckoutResult> {
        let customer = self.resolve_customer(user).await?;

        let metadata = HashMap::from([
            (METADATA_USER_ID.to_string(), user.id.to_string()),
            (METADATA_PRICE_ID.to_string(), plan_id.to_string()),
        ]);

        let request = CheckoutSessionRequest {
            customer,
            price_id: plan_id.to_string(),
            success_url: self.urls.success_url.clone(),
            cancel_url: self.urls.cancel_url.clone(),
            client_reference_id: user.id.to_string(),
            metadata,
            trial_period_days: grant_trial.then(|| self.plans.trial_period_days()),
        };

        let session = self.provider.create_checkout_session(&request).await?;
        let url = session.url.ok_or_else(|| {
            AppError::PaymentProvider("Checkout session returned without a URL".into())
        })?;

        tracing::info!(
            user_id = %user.id,
            plan_id,
            session_id = %session.session_id,
            trial = grant_trial,
            "Checkout session created"
        );

        Ok(CheckoutResult {
            url,
            session_id: session.session_id,
            trial_granted: grant_trial,
        })
    }

    /// Existing customer id, or a new provider customer on first checkout.
    async fn resolve_customer(&self, user: &UserProfile) -> AppResult<CustomerId> {
        if let Some(existing) = &user.stripe_customer_id {
            return Ok(CustomerId::new(existing));
        }
        let metadata = HashMap::from([(METADATA_USER_ID.to_string(), user.id.to_string())]);
        self.provider
            .create_customer(&user.email, &user.name, metadata)
            .await
    }
}
