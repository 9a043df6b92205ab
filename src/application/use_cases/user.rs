use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{plans::PlanCatalog, validators::is_valid_email},
    domain::entities::{
        plan_status::PlanStatus,
        subscription_lifecycle::SubscriptionLifecycle,
        user::{SubscriptionUpdate, UserProfile},
    },
};

#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub name: String,
    pub email: String,
}

/// User store. The single source of truth for subscription state.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create(&self, input: &CreateUserInput) -> AppResult<UserProfile>;
    async fn get_by_id(&self, user_id: Uuid) -> AppResult<Option<UserProfile>>;
    async fn get_by_email(&self, email: &str) -> AppResult<Option<UserProfile>>;

    /// Fallback correlation for events that carry no user metadata.
    /// Relies on the provider never sharing a subscription id between users.
    async fn get_by_subscription_id(&self, subscription_id: &str)
    -> AppResult<Option<UserProfile>>;

    /// Atomically overwrite all subscription fields. `NotFound` when the user
    /// does not exist.
    async fn update_subscription(&self, user_id: Uuid, update: &SubscriptionUpdate)
    -> AppResult<()>;

    /// Set `has_used_trial`. Idempotent and never reversible.
    async fn mark_trial_used(&self, user_id: Uuid) -> AppResult<()>;
}

/// Local view of a user's subscription.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetails {
    pub is_subscribed: bool,
    pub plan_status: Option<PlanStatus>,
    pub price_id: Option<String>,
    pub plan_name: Option<String>,
    pub lifecycle: SubscriptionLifecycle,
    pub is_in_trial: bool,
    pub has_used_trial: bool,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub has_access: bool,
}

#[derive(Clone)]
pub struct UserUseCases {
    repo: Arc<dyn UserRepo>,
    plans: Arc<PlanCatalog>,
}

impl UserUseCases {
    pub fn new(repo: Arc<dyn UserRepo>, plans: Arc<PlanCatalog>) -> Self {
        Self { repo, plans }
    }

    #[instrument(skip(self))]
    pub async fn register(&self, name: &str, email: &str) -> AppResult<UserProfile> {
        let name = name.trim();
        let email = email.trim().to_lowercase();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Name is required".into()));
        }
        if !is_valid_email(&email) {
            return Err(AppError::InvalidInput("Invalid email address".into()));
        }
        if self.repo.get_by_email(&email).await?.is_some() {
            return Err(AppError::AlreadyExists);
        }

        let user = self
            .repo
            .create(&CreateUserInput {
                name: name.to_string(),
                email,
            })
            .await?;
        tracing::info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> AppResult<UserProfile> {
        self.repo.get_by_id(user_id).await?.ok_or(AppError::NotFound)
    }

    pub async fn subscription_details(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<SubscriptionDetails> {
        let user = self.get_user(user_id).await?;
        let plan_name = user
            .stripe_price_id
            .as_deref()
            .map(|price_id| self.plans.display_name(price_id).to_string());

        Ok(SubscriptionDetails {
            is_subscribed: user.is_subscribed,
            plan_status: user.plan_status.clone(),
            price_id: user.stripe_price_id.clone(),
            plan_name,
            lifecycle: SubscriptionLifecycle::of(&user, now),
            is_in_trial: user.is_in_trial,
            has_used_trial: user.has_used_trial,
            trial_ends_at: user.trial_ends_at,
            subscription_ends_at: user.subscription_ends_at,
            has_access: user.has_access(now),
        })
    }
}
