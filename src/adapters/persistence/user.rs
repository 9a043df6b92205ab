use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::user::{CreateUserInput, UserRepo},
    domain::entities::{
        plan_status::PlanStatus,
        user::{SubscriptionUpdate, UserProfile},
    },
};

const USER_COLUMNS: &str = r#"
    id, name, email, stripe_customer_id, stripe_subscription_id, stripe_price_id,
    plan_status, is_subscribed, is_in_trial, has_used_trial, trial_starts_at,
    trial_ends_at, subscription_ends_at, last_payment_at, created_at, updated_at
"#;

// User struct as stored in the db.
#[derive(sqlx::FromRow, Debug)]
pub struct UserDb {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub stripe_price_id: Option<String>,
    pub plan_status: Option<String>,
    pub is_subscribed: bool,
    pub is_in_trial: bool,
    pub has_used_trial: bool,
    pub trial_starts_at: Option<DateTime<Utc>>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    pub subscription_ends_at: Option<DateTime<Utc>>,
    pub last_payment_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<UserDb> for UserProfile {
    fn from(r: UserDb) -> Self {
        UserProfile {
            id: r.id,
            name: r.name,
            email: r.email,
            stripe_customer_id: r.stripe_customer_id,
            stripe_subscription_id: r.stripe_subscription_id,
            stripe_price_id: r.stripe_price_id,
            plan_status: r.plan_status.as_deref().map(PlanStatus::from_provider),
            is_subscribed: r.is_subscribed,
            is_in_trial: r.is_in_trial,
            has_used_trial: r.has_used_trial,
            trial_starts_at: r.trial_starts_at,
            trial_ends_at: r.trial_ends_at,
            subscription_ends_at: r.subscription_ends_at,
            last_payment_at: r.last_payment_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

impl PostgresPersistence {
    async fn fetch_user_where(
        &self,
        condition: &str,
        value: &str,
    ) -> AppResult<Option<UserProfile>> {
        let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, condition);
        let rec = sqlx::query_as::<_, UserDb>(&sql)
            .bind(value)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(rec.map(UserProfile::from))
    }
}

#[async_trait]
impl UserRepo for PostgresPersistence {
    async fn create(&self, input: &CreateUserInput) -> AppResult<UserProfile> {
        let sql = format!(
            "INSERT INTO users (id, name, email) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );
        let rec = sqlx::query_as::<_, UserDb>(&sql)
            .bind(Uuid::new_v4())
            .bind(&input.name)
            .bind(&input.email)
            .fetch_one(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(rec.into())
    }

    async fn get_by_id(&self, user_id: Uuid) -> AppResult<Option<UserProfile>> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let rec = sqlx::query_as::<_, UserDb>(&sql)
            .bind(user_id)
            .fetch_optional(self.pool())
            .await
            .map_err(AppError::from)?;
        Ok(rec.map(UserProfile::from))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<UserProfile>> {
        self.fetch_user_where("email", email).await
    }

    async fn get_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> AppResult<Option<UserProfile>> {
        self.fetch_user_where("stripe_subscription_id", subscription_id)
            .await
    }

    async fn update_subscription(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
                UPDATE users SET
                    stripe_customer_id = COALESCE($2, stripe_customer_id),
                    stripe_subscription_id = $3,
                    stripe_price_id = $4,
                    plan_status = $5,
                    is_subscribed = $6,
                    is_in_trial = $7,
                    has_used_trial = users.has_used_trial OR $8,
                    trial_starts_at = $9,
                    trial_ends_at = $10,
                    subscription_ends_at = $11,
                    last_payment_at = $12,
                    updated_at = NOW()
                WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(update.stripe_customer_id.as_deref())
        .bind(update.stripe_subscription_id.as_deref())
        .bind(update.stripe_price_id.as_deref())
        .bind(update.plan_status.as_ref().map(PlanStatus::as_str))
        .bind(update.is_subscribed)
        .bind(update.is_in_trial)
        .bind(update.has_used_trial)
        .bind(update.trial_starts_at)
        .bind(update.trial_ends_at)
        .bind(update.subscription_ends_at)
        .bind(update.last_payment_at)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }

    async fn mark_trial_used(&self, user_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET has_used_trial = TRUE, updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(self.pool())
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
        Ok(())
    }
}
