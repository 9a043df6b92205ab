use std::net::SocketAddr;
use std::time::Duration;

use axum::http::HeaderValue;
use env_helpers::{get_env, get_env_default};
use secrecy::SecretString;
use url::Url;

use crate::application::plans::{DEFAULT_TRIAL_PERIOD_DAYS, Plan, PlanCatalog};

pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Frontend origin; checkout redirects land on `/success` and `/cancel`.
    pub client_url: Url,
    pub cors_origin: HeaderValue,
    pub stripe_secret_key: SecretString,
    pub stripe_webhook_secret: SecretString,
    pub price_id_basic: Option<String>,
    pub price_id_premium: Option<String>,
    pub price_id_advanced: Option<String>,
    /// The only plan a trial is granted for.
    pub trial_price_id: Option<String>,
    pub trial_period_days: u32,
    pub stripe_timeout: Duration,
    pub stripe_connect_timeout: Duration,
    pub webhook_tolerance_secs: i64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let database_url: String = get_env("DATABASE_URL");
        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", "127.0.0.1:3000".parse().unwrap());
        let client_url: Url = get_env_default("CLIENT_URL", String::from("http://localhost:5173"))
            .parse()
            .expect("CLIENT_URL must be a valid URL");
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", client_url.origin().ascii_serialization())
                .parse()
                .expect("CORS_ORIGIN must be a valid header value");

        let stripe_secret_key = SecretString::new(get_env::<String>("STRIPE_SECRET_KEY").into());
        let stripe_webhook_secret =
            SecretString::new(get_env::<String>("STRIPE_WEBHOOK_SECRET").into());

        let price_id_basic = optional_env("STRIPE_PRICE_ID_BASIC");
        let price_id_premium = optional_env("STRIPE_PRICE_ID_PREMIUM");
        let price_id_advanced = optional_env("STRIPE_PRICE_ID_ADVANCED");
        let trial_price_id = optional_env("TRIAL_PRICE_ID").or_else(|| price_id_basic.clone());
        let trial_period_days: u32 = get_env_default("TRIAL_PERIOD_DAYS", DEFAULT_TRIAL_PERIOD_DAYS);

        let stripe_timeout_secs: u64 = get_env_default("STRIPE_TIMEOUT_SECS", 30);
        let stripe_connect_timeout_secs: u64 = get_env_default("STRIPE_CONNECT_TIMEOUT_SECS", 5);
        let webhook_tolerance_secs: i64 = get_env_default("WEBHOOK_TOLERANCE_SECS", 300);

        Self {
            database_url,
            bind_addr,
            client_url,
            cors_origin,
            stripe_secret_key,
            stripe_webhook_secret,
            price_id_basic,
            price_id_premium,
            price_id_advanced,
            trial_price_id,
            trial_period_days,
            stripe_timeout: Duration::from_secs(stripe_timeout_secs),
            stripe_connect_timeout: Duration::from_secs(stripe_connect_timeout_secs),
            webhook_tolerance_secs,
        }
    }

    pub fn plan_catalog(&self) -> PlanCatalog {
        let plans = [
            ("basic", "Basic Plan", &self.price_id_basic),
            ("premium", "Premium Plan", &self.price_id_premium),
            ("advanced", "Advanced Plan", &self.price_id_advanced),
        ]
        .into_iter()
        .filter_map(|(code, name, price_id)| {
            price_id.as_ref().map(|price_id| Plan {
                code: code.to_string(),
                name: name.to_string(),
                price_id: price_id.clone(),
            })
        })
        .collect();

        PlanCatalog::new(plans, self.trial_price_id.clone(), self.trial_period_days)
    }

    pub fn success_url(&self) -> String {
        self.client_path("success")
    }

    pub fn cancel_url(&self) -> String {
        self.client_path("cancel")
    }

    fn client_path(&self, path: &str) -> String {
        format!("{}/{}", self.client_url.as_str().trim_end_matches('/'), path)
    }
}

/// Unset and empty both mean "not configured".
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
