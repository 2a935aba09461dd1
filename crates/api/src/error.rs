//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::{CartError, OrderError, PaymentError};
use inventory::LedgerError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Cart operation error.
    Cart(CartError),
    /// Checkout or payment coordination error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Cart(err) => cart_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn cart_error_to_response(err: CartError) -> (StatusCode, String) {
    match &err {
        CartError::ItemNotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        CartError::InvalidQuantity { .. } | CartError::SelfMerge => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::EmptyCart | CheckoutError::ProductUnavailable(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        // Names every offending line via the ledger error display.
        CheckoutError::Ledger(LedgerError::InsufficientStock { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::Order(OrderError::InvalidStatusTransition { .. })
        | CheckoutError::Payment(PaymentError::InvalidTransition { .. }) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::Order(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::AmountMismatch { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::OrderNotFound(_) | CheckoutError::UnknownTransaction(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CheckoutError::GatewayUnavailable(_) => (StatusCode::BAD_GATEWAY, err.to_string()),
        CheckoutError::GatewayRejected(_) => (StatusCode::PAYMENT_REQUIRED, err.to_string()),
        CheckoutError::Store(StoreError::NotFound { .. }) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CheckoutError::Ledger(LedgerError::ProductNotFound(_)) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        CheckoutError::Store(_) | CheckoutError::Ledger(_) => {
            tracing::error!(error = %err, "infrastructure error");
            (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{entity} not found: {id}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Checkout(CheckoutError::Ledger(err))
    }
}
