//! Test app state builder for HTTP-level testing.
//!
//! `TestAppStateBuilder` wires every use case to an `InMemoryUserRepo` and a
//! `FakeBillingProvider`, and hands both back so tests can seed and inspect
//! them.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use secrecy::SecretString;
use url::Url;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        plans::PlanCatalog,
        ports::billing_provider::{BillingProvider, SubscriptionInfo},
        use_cases::{
            cancellation::CancellationUseCases,
            checkout::{CheckoutUrls, CheckoutUseCases},
            plan_change::PlanChangeUseCases,
            reconciler::{LoggingTrialNotifier, SubscriptionReconciler, WebhookSettings},
            user::{UserRepo, UserUseCases},
        },
    },
    domain::entities::user::UserProfile,
    infra::config::AppConfig,
    test_utils::{FakeBillingProvider, InMemoryUserRepo, create_test_plan_catalog},
};

pub const TEST_WEBHOOK_SECRET: &str = "whsec_test_secret";

pub struct TestAppState {
    pub app_state: AppState,
    pub users: Arc<InMemoryUserRepo>,
    pub provider: Arc<FakeBillingProvider>,
}

pub struct TestAppStateBuilder {
    users: Vec<UserProfile>,
    subscriptions: Vec<SubscriptionInfo>,
    plans: PlanCatalog,
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            users: vec![],
            subscriptions: vec![],
            plans: create_test_plan_catalog(),
        }
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.users.push(user);
        self
    }

    pub fn with_subscription(mut self, subscription: SubscriptionInfo) -> Self {
        self.subscriptions.push(subscription);
        self
    }

    pub fn build(self) -> TestAppState {
        let config = test_config();
        let users = Arc::new(InMemoryUserRepo::with_users(self.users));
        let provider = Arc::new(FakeBillingProvider::new());
        for sub in self.subscriptions {
            provider.put_subscription(sub);
        }

        let user_repo = users.clone() as Arc<dyn UserRepo>;
        let billing = provider.clone() as Arc<dyn BillingProvider>;
        let plans = Arc::new(self.plans);

        let app_state = AppState {
            user_use_cases: Arc::new(UserUseCases::new(user_repo.clone(), plans.clone())),
            checkout_use_cases: Arc::new(CheckoutUseCases::new(
                user_repo.clone(),
                billing.clone(),
                plans.clone(),
                CheckoutUrls {
                    success_url: config.success_url(),
                    cancel_url: config.cancel_url(),
                },
            )),
            reconciler: Arc::new(SubscriptionReconciler::new(
                user_repo.clone(),
                billing.clone(),
                Arc::new(LoggingTrialNotifier),
                WebhookSettings {
                    secret: config.stripe_webhook_secret.clone(),
                    tolerance_secs: config.webhook_tolerance_secs,
                },
            )),
            plan_change_use_cases: Arc::new(PlanChangeUseCases::new(
                user_repo.clone(),
                billing.clone(),
                plans,
            )),
            cancellation_use_cases: Arc::new(CancellationUseCases::new(user_repo, billing)),
            config: Arc::new(config),
        };

        TestAppState {
            app_state,
            users,
            provider,
        }
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "postgres://localhost/subsync_test".to_string(),
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        client_url: Url::parse("http://localhost:5173").unwrap(),
        cors_origin: HeaderValue::from_static("http://localhost:5173"),
        stripe_secret_key: SecretString::new("sk_test_123".into()),
        stripe_webhook_secret: SecretString::new(TEST_WEBHOOK_SECRET.into()),
        price_id_basic: Some("price_basic".to_string()),
        price_id_premium: Some("price_premium".to_string()),
        price_id_advanced: Some("price_advanced".to_string()),
        trial_price_id: Some("price_basic".to_string()),
        trial_period_days: 7,
        stripe_timeout: Duration::from_secs(30),
        stripe_connect_timeout: Duration::from_secs(5),
        webhook_tolerance_secs: 300,
    }
}
