use crate::{
    adapters::http::app_state::AppState,
    application::use_cases::{
        cancellation::CancellationUseCases,
        checkout::{CheckoutUrls, CheckoutUseCases},
        plan_change::PlanChangeUseCases,
        reconciler::{LoggingTrialNotifier, SubscriptionReconciler, WebhookSettings},
        user::{UserRepo, UserUseCases},
    },
    application::ports::billing_provider::BillingProvider,
    infra::{
        config::AppConfig, http_client::build_client, postgres_persistence,
        stripe_billing_adapter::StripeBillingAdapter, stripe_client::StripeClient,
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env();

    let postgres_arc = Arc::new(postgres_persistence(&config.database_url).await?);
    let user_repo_arc = postgres_arc.clone() as Arc<dyn UserRepo>;

    let http = build_client(config.stripe_connect_timeout, config.stripe_timeout);
    let stripe = StripeClient::new(http, config.stripe_secret_key.clone());
    let provider = Arc::new(StripeBillingAdapter::new(stripe)) as Arc<dyn BillingProvider>;

    let plans = Arc::new(config.plan_catalog());
    if plans.plans().is_empty() {
        tracing::warn!("No STRIPE_PRICE_ID_* configured, accepting any price id");
    }

    let user_use_cases = UserUseCases::new(user_repo_arc.clone(), plans.clone());

    let checkout_use_cases = CheckoutUseCases::new(
        user_repo_arc.clone(),
        provider.clone(),
        plans.clone(),
        CheckoutUrls {
            success_url: config.success_url(),
            cancel_url: config.cancel_url(),
        },
    );

    let reconciler = SubscriptionReconciler::new(
        user_repo_arc.clone(),
        provider.clone(),
        Arc::new(LoggingTrialNotifier),
        WebhookSettings {
            secret: config.stripe_webhook_secret.clone(),
            tolerance_secs: config.webhook_tolerance_secs,
        },
    );

    let plan_change_use_cases =
        PlanChangeUseCases::new(user_repo_arc.clone(), provider.clone(), plans);

    let cancellation_use_cases = CancellationUseCases::new(user_repo_arc, provider);

    Ok(AppState {
        config: Arc::new(config),
        user_use_cases: Arc::new(user_use_cases),
        checkout_use_cases: Arc::new(checkout_use_cases),
        reconciler: Arc::new(reconciler),
        plan_change_use_cases: Arc::new(plan_change_use_cases),
        cancellation_use_cases: Arc::new(cancellation_use_cases),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "subsync=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false) // don't show target (module path)
        .with_level(true) // show log level
        .pretty(); // human-friendly, with colors

    // File (structured JSON logs)
    let file = File::create("app.log").expect("cannot create log file");
    let json_layer = fmt::layer()
        .json()
        .with_writer(file)
        .with_current_span(true)
        .with_span_list(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
