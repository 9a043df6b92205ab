use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found")]
    NotFound,

    #[error("No active subscription")]
    NoActiveSubscription,

    #[error("Already exists")]
    AlreadyExists,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Remote call to the payment provider failed.
    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    /// The provider answered that the referenced object does not exist.
    /// Cancellation relies on this class to self-heal local state.
    #[error("Payment provider resource missing: {0}")]
    ProviderResourceMissing(String),

    #[error("Payment provider timed out")]
    ProviderTimeout,

    /// Webhook event lacks the metadata needed to correlate it with a user.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    #[error("Plan change failed: {0}")]
    PlanChange(String),

    #[error("Cancellation failed: {0}")]
    Cancellation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// True for every error that originated at the payment provider.
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            AppError::PaymentProvider(_)
                | AppError::ProviderResourceMissing(_)
                | AppError::ProviderTimeout
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCode {
    DatabaseError,
    NotFound,
    NoActiveSubscription,
    AlreadyExists,
    InvalidInput,
    PaymentProviderError,
    DataIntegrityError,
    SignatureVerificationError,
    PlanChangeError,
    CancellationError,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::NoActiveSubscription => "NO_ACTIVE_SUBSCRIPTION",
            ErrorCode::AlreadyExists => "ALREADY_EXISTS",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::PaymentProviderError => "PAYMENT_PROVIDER_ERROR",
            ErrorCode::DataIntegrityError => "DATA_INTEGRITY_ERROR",
            ErrorCode::SignatureVerificationError => "SIGNATURE_VERIFICATION_ERROR",
            ErrorCode::PlanChangeError => "PLAN_CHANGE_ERROR",
            ErrorCode::CancellationError => "CANCELLATION_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
