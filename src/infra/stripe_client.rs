use reqwest::{Client, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;

use crate::app_error::{AppError, AppResult};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe error code for a reference to an object that does not exist.
const RESOURCE_MISSING: &str = "resource_missing";

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
}

impl StripeClient {
    /// `client` must come from [`crate::infra::http_client`] so every call is
    /// bounded by a timeout.
    pub fn new(client: Client, secret_key: SecretString) -> Self {
        Self { client, secret_key }
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/{}", STRIPE_API_BASE, path))
            .header("Authorization", self.auth_header())
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.client
            .post(format!("{}/{}", STRIPE_API_BASE, path))
            .header("Authorization", self.auth_header())
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.client
            .delete(format!("{}/{}", STRIPE_API_BASE, path))
            .header("Authorization", self.auth_header())
    }

    // ========================================================================
    // Customers
    // ========================================================================

    pub async fn create_customer(
        &self,
        email: &str,
        name: &str,
        metadata: HashMap<String, String>,
    ) -> AppResult<StripeCustomer> {
        let mut params: Vec<(String, String)> = vec![
            ("email".to_string(), email.to_string()),
            ("name".to_string(), name.to_string()),
        ];
        push_metadata(&mut params, "metadata", &metadata);

        self.send(self.post("customers").form(&params)).await
    }

    // ========================================================================
    // Checkout Sessions
    // ========================================================================

    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionParams<'_>,
    ) -> AppResult<StripeCheckoutSession> {
        let mut params: Vec<(String, String)> = vec![
            ("customer".to_string(), request.customer_id.to_string()),
            ("mode".to_string(), "subscription".to_string()),
            ("payment_method_types[0]".to_string(), "card".to_string()),
            ("line_items[0][price]".to_string(), request.price_id.to_string()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url.to_string()),
            ("cancel_url".to_string(), request.cancel_url.to_string()),
            (
                "client_reference_id".to_string(),
                request.client_reference_id.to_string(),
            ),
        ];

        // Echoed on the session and on the subscription it creates.
        push_metadata(&mut params, "metadata", request.metadata);
        push_metadata(&mut params, "subscription_data[metadata]", request.metadata);

        if let Some(days) = request.trial_period_days
            && days > 0
        {
            params.push((
                "subscription_data[trial_period_days]".to_string(),
                days.to_string(),
            ));
        }

        self.send(self.post("checkout/sessions").form(&params)).await
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    pub async fn get_subscription(&self, subscription_id: &str) -> AppResult<StripeSubscription> {
        self.send(self.get(&format!("subscriptions/{}", subscription_id)))
            .await
    }

    pub async fn update_subscription_price(
        &self,
        subscription_id: &str,
        subscription_item_id: &str,
        new_price_id: &str,
        trial_end: Option<i64>,
    ) -> AppResult<StripeSubscription> {
        let mut params: Vec<(String, String)> = vec![
            ("items[0][id]".to_string(), subscription_item_id.to_string()),
            ("items[0][price]".to_string(), new_price_id.to_string()),
            ("proration_behavior".to_string(), "none".to_string()),
        ];
        if let Some(trial_end) = trial_end {
            params.push(("trial_end".to_string(), trial_end.to_string()));
        }

        self.send(
            self.post(&format!("subscriptions/{}", subscription_id))
                .form(&params),
        )
        .await
    }

    pub async fn cancel_subscription(
        &self,
        subscription_id: &str,
        at_period_end: bool,
    ) -> AppResult<StripeSubscription> {
        let path = format!("subscriptions/{}", subscription_id);
        if at_period_end {
            self.send(self.post(&path).form(&[("cancel_at_period_end", "true")]))
                .await
        } else {
            self.send(self.delete(&path)).await
        }
    }

    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        metadata: &HashMap<String, String>,
    ) -> AppResult<StripeSubscription> {
        let mut params: Vec<(String, String)> = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
        ];
        push_metadata(&mut params, "metadata", metadata);

        self.send(self.post("subscriptions").form(&params)).await
    }

    // ========================================================================
    // Invoices, payments and refunds
    // ========================================================================

    /// Most recent paid invoice of a subscription.
    pub async fn latest_paid_invoice(
        &self,
        subscription_id: &str,
    ) -> AppResult<Option<StripeInvoice>> {
        let query = [
            ("subscription", subscription_id),
            ("status", "paid"),
            ("limit", "1"),
        ];
        let list: StripeInvoiceList = self.send(self.get("invoices").query(&query)).await?;
        Ok(list.data.into_iter().next())
    }

    pub async fn get_payment_intent(&self, payment_intent_id: &str) -> AppResult<StripePaymentIntent> {
        self.send(self.get(&format!("payment_intents/{}", payment_intent_id)))
            .await
    }

    pub async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount: i64,
    ) -> AppResult<StripeRefund> {
        let params = [
            ("payment_intent", payment_intent_id.to_string()),
            ("amount", amount.to_string()),
            ("reason", "requested_by_customer".to_string()),
        ];

        self.send(self.post("refunds").form(&params)).await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn send<T: for<'de> Deserialize<'de>>(&self, request: RequestBuilder) -> AppResult<T> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::error!(error = %e, "Stripe request timed out");
                AppError::ProviderTimeout
            } else {
                AppError::PaymentProvider(format!("Stripe request failed: {}", e))
            }
        })?;
        self.handle_response(response).await
    }

    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            AppError::PaymentProvider(format!("Failed to read response: {}", e))
        })?;

        if !status.is_success() {
            tracing::error!(status = %status, body = %body, "Stripe API error");
            return Err(map_stripe_error(status, &body));
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(body = %body, error = %e, "Failed to parse Stripe response");
            AppError::PaymentProvider(format!("Failed to parse Stripe response: {}", e))
        })
    }
}

fn push_metadata(
    params: &mut Vec<(String, String)>,
    prefix: &str,
    metadata: &HashMap<String, String>,
) {
    for (key, value) in metadata {
        params.push((format!("{}[{}]", prefix, key), value.clone()));
    }
}

fn map_stripe_error(status: StatusCode, body: &str) -> AppError {
    let parsed = serde_json::from_str::<StripeErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|e| e.error.message.clone())
        .unwrap_or_else(|| format!("Stripe API error: {}", status));

    let missing = status == StatusCode::NOT_FOUND
        || parsed
            .as_ref()
            .and_then(|e| e.error.code.as_deref())
            .is_some_and(|code| code == RESOURCE_MISSING);

    if missing {
        AppError::ProviderResourceMissing(message)
    } else {
        AppError::PaymentProvider(message)
    }
}

pub struct CheckoutSessionParams<'a> {
    pub customer_id: &'a str,
    pub price_id: &'a str,
    pub success_url: &'a str,
    pub cancel_url: &'a str,
    pub client_reference_id: &'a str,
    pub metadata: &'a HashMap<String, String>,
    pub trial_period_days: Option<u32>,
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    /// Moved onto the items in newer API versions.
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub trial_start: Option<i64>,
    #[serde(default)]
    pub trial_end: Option<i64>,
    pub items: StripeSubscriptionItems,
}

impl StripeSubscription {
    pub fn first_item(&self) -> Option<&StripeSubscriptionItem> {
        self.items.data.first()
    }

    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| self.first_item().and_then(|i| i.current_period_start))
    }

    pub fn period_end(&self) -> Option<i64> {
        self.current_period_end
            .or_else(|| self.first_item().and_then(|i| i.current_period_end))
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItems {
    pub data: Vec<StripeSubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: String,
    pub price: StripePrice,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub amount_paid: i64,
    pub currency: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoiceList {
    pub data: Vec<StripeInvoice>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub amount_received: i64,
}

#[derive(Debug, Deserialize)]
pub struct StripeRefund {
    pub id: String,
    pub amount: i64,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Deserialize)]
pub struct StripeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
    pub code: Option<String>,
}
