//! Checkout and payment coordination errors.

use common::{Money, OrderId};
use thiserror::Error;

/// Errors that can occur during checkout and payment coordination.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Checkout requires at least one cart line.
    #[error("Cart is empty")]
    EmptyCart,

    /// The product is unknown to the catalog or has been deactivated.
    #[error("Product unavailable: {0}")]
    ProductUnavailable(String),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// No payment is recorded for the given transaction ID.
    #[error("Unknown payment transaction: {0}")]
    UnknownTransaction(String),

    /// The gateway-reported amount does not equal the order's final
    /// amount.
    #[error("Amount mismatch: expected {expected}, gateway reported {reported}")]
    AmountMismatch { expected: Money, reported: Money },

    /// The gateway could not be reached within the retry budget. The
    /// payment stays pending for webhook or reconciliation resolution.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The gateway rejected the request outright.
    #[error("Payment gateway rejected request: {0}")]
    GatewayRejected(String),

    /// Order state machine violation.
    #[error(transparent)]
    Order(#[from] domain::OrderError),

    /// Payment state machine violation.
    #[error(transparent)]
    Payment(#[from] domain::PaymentError),

    /// Stock ledger error, including insufficient stock.
    #[error(transparent)]
    Ledger(#[from] inventory::LedgerError),

    /// Repository error.
    #[error(transparent)]
    Store(#[from] store::StoreError),
}

/// Result type for checkout operations.
pub type Result<T> = std::result::Result<T, CheckoutError>;
