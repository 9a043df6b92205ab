//! Billing events delivered by the payment provider's webhooks.
//!
//! The raw envelope is decoded into a closed set of event kinds, each with its
//! own typed payload. Fields that the provider may omit are optional here;
//! the reconciler decides which ones are required.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::app_error::{AppError, AppResult};

pub const CHECKOUT_SESSION_COMPLETED: &str = "checkout.session.completed";
pub const SUBSCRIPTION_TRIAL_WILL_END: &str = "customer.subscription.trial_will_end";
pub const SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
pub const SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

/// Metadata keys echoed back by the provider on checkout sessions.
pub const METADATA_USER_ID: &str = "userId";
pub const METADATA_PRICE_ID: &str = "priceId";

/// Event envelope as sent by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// A delivery body carries either one event or an array of events.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Delivery {
    Many(Vec<EventEnvelope>),
    One(Box<EventEnvelope>),
}

pub fn parse_delivery(body: &str) -> AppResult<Vec<EventEnvelope>> {
    let delivery: Delivery = serde_json::from_str(body)
        .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;
    Ok(match delivery {
        Delivery::Many(events) => events,
        Delivery::One(event) => vec![*event],
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum BillingEvent {
    CheckoutCompleted(CheckoutCompleted),
    TrialWillEnd(SubscriptionRef),
    SubscriptionUpdated(SubscriptionRef),
    SubscriptionDeleted(SubscriptionRef),
    /// Event kinds this service does not act on.
    Ignored,
}

impl BillingEvent {
    pub fn decode(envelope: &EventEnvelope) -> AppResult<Self> {
        let object = envelope.data.object.clone();
        let event = match envelope.event_type.as_str() {
            CHECKOUT_SESSION_COMPLETED => BillingEvent::CheckoutCompleted(decode_object(object)?),
            SUBSCRIPTION_TRIAL_WILL_END => BillingEvent::TrialWillEnd(decode_object(object)?),
            SUBSCRIPTION_UPDATED => BillingEvent::SubscriptionUpdated(decode_object(object)?),
            SUBSCRIPTION_DELETED => BillingEvent::SubscriptionDeleted(decode_object(object)?),
            _ => BillingEvent::Ignored,
        };
        Ok(event)
    }
}

fn decode_object<T: for<'de> Deserialize<'de>>(object: serde_json::Value) -> AppResult<T> {
    serde_json::from_value(object)
        .map_err(|e| AppError::DataIntegrity(format!("Event payload does not match schema: {}", e)))
}

/// Checkout session object of a `checkout.session.completed` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CheckoutCompleted {
    #[serde(rename = "id")]
    pub session_id: String,
    #[serde(rename = "customer", default)]
    pub customer_id: Option<String>,
    #[serde(rename = "subscription", default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutCompleted {
    pub fn metadata_user_id(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_USER_ID)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn metadata_price_id(&self) -> Option<&str> {
        self.metadata
            .get(METADATA_PRICE_ID)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Subscription object of a `customer.subscription.*` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubscriptionRef {
    #[serde(rename = "id")]
    pub subscription_id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub trial_end: Option<DateTime<Utc>>,
}
