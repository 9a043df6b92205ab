//! In-memory user store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::user::{CreateUserInput, UserRepo},
    domain::entities::user::{SubscriptionUpdate, UserProfile},
};

#[derive(Default)]
pub struct InMemoryUserRepo {
    pub users: Mutex<HashMap<Uuid, UserProfile>>,
    fail_updates: AtomicBool,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: Vec<UserProfile>) -> Self {
        let map: HashMap<Uuid, UserProfile> = users.into_iter().map(|u| (u.id, u)).collect();
        Self {
            users: Mutex::new(map),
            fail_updates: AtomicBool::new(false),
        }
    }

    pub fn get(&self, user_id: Uuid) -> Option<UserProfile> {
        self.users.lock().unwrap().get(&user_id).cloned()
    }

    /// Make `update_subscription` fail with a database error.
    /// `mark_trial_used` keeps working.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn create(&self, input: &CreateUserInput) -> AppResult<UserProfile> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == input.email) {
            return Err(AppError::AlreadyExists);
        }
        let now = chrono::Utc::now();
        let user = UserProfile {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            email: input.email.clone(),
            stripe_customer_id: None,
            stripe_subscription_id: None,
            stripe_price_id: None,
            plan_status: None,
            is_subscribed: false,
            is_in_trial: false,
            has_used_trial: false,
            trial_starts_at: None,
            trial_ends_at: None,
            subscription_ends_at: None,
            last_payment_at: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_by_id(&self, user_id: Uuid) -> AppResult<Option<UserProfile>> {
        Ok(self.get(user_id))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<UserProfile>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn get_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> AppResult<Option<UserProfile>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.stripe_subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    async fn update_subscription(
        &self,
        user_id: Uuid,
        update: &SubscriptionUpdate,
    ) -> AppResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(AppError::Database("connection reset".into()));
        }
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        update.apply_to(user);
        Ok(())
    }

    async fn mark_trial_used(&self, user_id: Uuid) -> AppResult<()> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(AppError::NotFound)?;
        user.has_used_trial = true;
        Ok(())
    }
}
