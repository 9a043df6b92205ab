use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    app_error::AppResult,
    application::use_cases::{checkout::CheckoutInput, plan_change::PlanChangeInput},
};

const SIGNATURE_HEADER: &str = "stripe-signature";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/create-checkout-session", post(create_checkout_session))
        .route("/cancel-subscription", post(cancel_subscription))
        .route("/change-plan", post(change_plan))
        .route("/subscription/{user_id}", get(subscription_details))
}

/// The body is taken raw: the signature covers the exact bytes sent.
async fn webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let ack = app_state.reconciler.handle_delivery(&body, signature).await?;
    Ok(Json(ack))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCheckoutSessionPayload {
    plan_id: String,
    user_id: Uuid,
    #[serde(default)]
    is_changing_plan: bool,
}

async fn create_checkout_session(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateCheckoutSessionPayload>,
) -> AppResult<impl IntoResponse> {
    let result = app_state
        .checkout_use_cases
        .create_checkout_session(&CheckoutInput {
            user_id: payload.user_id,
            plan_id: payload.plan_id.trim().to_string(),
            is_changing_plan: payload.is_changing_plan,
        })
        .await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelSubscriptionPayload {
    user_id: Uuid,
}

async fn cancel_subscription(
    State(app_state): State<AppState>,
    Json(payload): Json<CancelSubscriptionPayload>,
) -> AppResult<impl IntoResponse> {
    let result = app_state
        .cancellation_use_cases
        .cancel(payload.user_id)
        .await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangePlanPayload {
    user_id: Uuid,
    new_plan_id: String,
}

async fn change_plan(
    State(app_state): State<AppState>,
    Json(payload): Json<ChangePlanPayload>,
) -> AppResult<impl IntoResponse> {
    let result = app_state
        .plan_change_use_cases
        .change_plan(&PlanChangeInput {
            user_id: payload.user_id,
            new_plan_id: payload.new_plan_id.trim().to_string(),
        })
        .await?;
    Ok(Json(result))
}

async fn subscription_details(
    State(app_state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let details = app_state
        .user_use_cases
        .subscription_details(user_id, Utc::now())
        .await?;
    Ok(Json(details))
}
