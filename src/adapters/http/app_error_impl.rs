use crate::app_error::{AppError, ErrorCode};
use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the error before it gets converted into a status response.
        tracing::error!(error = ?self, "Request failed");

        match self {
            AppError::Database(_) => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::DatabaseError,
                "Internal Server Error",
            ),
            AppError::NotFound => {
                error_resp(StatusCode::NOT_FOUND, ErrorCode::NotFound, "Not found")
            }
            AppError::NoActiveSubscription => error_resp(
                StatusCode::CONFLICT,
                ErrorCode::NoActiveSubscription,
                "No active subscription found",
            ),
            AppError::AlreadyExists => error_resp(
                StatusCode::CONFLICT,
                ErrorCode::AlreadyExists,
                "User already exists",
            ),
            AppError::InvalidInput(msg) => {
                error_resp(StatusCode::BAD_REQUEST, ErrorCode::InvalidInput, &msg)
            }
            AppError::DataIntegrity(_) => error_resp(
                StatusCode::BAD_REQUEST,
                ErrorCode::DataIntegrityError,
                "Event is missing required metadata",
            ),
            AppError::SignatureVerification(msg) => error_resp(
                StatusCode::BAD_REQUEST,
                ErrorCode::SignatureVerificationError,
                &format!("Webhook Error: {}", msg),
            ),
            AppError::PaymentProvider(_)
            | AppError::ProviderResourceMissing(_)
            | AppError::ProviderTimeout => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::PaymentProviderError,
                "Payment provider error",
            ),
            AppError::PlanChange(_) => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::PlanChangeError,
                "Failed to change plan",
            ),
            AppError::Cancellation(_) => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::CancellationError,
                "Failed to cancel subscription",
            ),
            AppError::Internal(_) => error_resp(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorCode::InternalError,
                "Internal Server Error",
            ),
        }
    }
}

fn error_resp(status: StatusCode, code: ErrorCode, message: &str) -> Response {
    let body = serde_json::json!({ "error": message, "code": code.as_str() });
    (status, Json(body)).into_response()
}
