use std::sync::Arc;

use crate::{
    application::use_cases::{
        cancellation::CancellationUseCases, checkout::CheckoutUseCases,
        plan_change::PlanChangeUseCases, reconciler::SubscriptionReconciler, user::UserUseCases,
    },
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub user_use_cases: Arc<UserUseCases>,
    pub checkout_use_cases: Arc<CheckoutUseCases>,
    pub reconciler: Arc<SubscriptionReconciler>,
    pub plan_change_use_cases: Arc<PlanChangeUseCases>,
    pub cancellation_use_cases: Arc<CancellationUseCases>,
}
