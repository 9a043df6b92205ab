pub mod billing;
pub mod user;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/stripe", billing::router())
        .nest("/users", user::router())
}
