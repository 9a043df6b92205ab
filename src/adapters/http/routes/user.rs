use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState, app_error::AppResult,
    domain::entities::user::UserProfile,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user))
        .route("/{id}", get(get_user))
}

#[derive(Deserialize)]
struct CreateUserPayload {
    name: String,
    email: String,
}

/// Public profile. Provider identifiers stay server-side.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    id: Uuid,
    name: String,
    email: String,
    is_subscribed: bool,
    has_used_trial: bool,
    created_at: Option<DateTime<Utc>>,
}

impl From<UserProfile> for UserResponse {
    fn from(user: UserProfile) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            is_subscribed: user.is_subscribed,
            has_used_trial: user.has_used_trial,
            created_at: user.created_at,
        }
    }
}

async fn create_user(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateUserPayload>,
) -> AppResult<impl IntoResponse> {
    let user = app_state
        .user_use_cases
        .register(&payload.name, &payload.email)
        .await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

async fn get_user(
    State(app_state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user = app_state.user_use_cases.get_user(id).await?;
    Ok(Json(UserResponse::from(user)))
}
