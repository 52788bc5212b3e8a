use actix_web::HttpResponse;
use thiserror::Error;

use crate::application::checkout_service::PlaceOrderError;
use crate::domain::errors::DomainError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Checkout failed: {0}")]
    Checkout(PlaceOrderError),

    #[error("Checkout timed out")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<DomainError> for AppError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::NotFound(what) => AppError::NotFound(what),
            DomainError::InvalidInput(_)
            | DomainError::InvalidAddress(_)
            | DomainError::EmptyCart
            | DomainError::ProductNotAvailable { .. }
            | DomainError::InsufficientStock { .. } => AppError::BadRequest(e.to_string()),
            DomainError::CartNotActive
            | DomainError::CartChanged { .. }
            | DomainError::DuplicatePayment(_)
            | DomainError::ConcurrencyConflict { .. }
            | DomainError::InvalidOrderStatusTransition { .. }
            | DomainError::OrderFrozen => AppError::Conflict(e.to_string()),
            DomainError::PaymentFailed(msg)
            | DomainError::PaymentNotConfirmed(msg)
            | DomainError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

impl From<PlaceOrderError> for AppError {
    fn from(e: PlaceOrderError) -> Self {
        AppError::Checkout(e)
    }
}

impl actix_web::ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::NotFound(_) => HttpResponse::NotFound().json(serde_json::json!({
                "error": self.to_string()
            })),
            AppError::BadRequest(msg) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": msg
            })),
            AppError::Conflict(msg) => HttpResponse::Conflict().json(serde_json::json!({
                "error": msg
            })),
            AppError::Checkout(e) => HttpResponse::UnprocessableEntity().json(e),
            AppError::Timeout => HttpResponse::GatewayTimeout().json(serde_json::json!({
                "error": self.to_string()
            })),
            AppError::Internal(_) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Internal server error"
            })),
        }
    }
}
