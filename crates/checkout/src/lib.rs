//! Checkout and payment coordination.
//!
//! [`CheckoutCoordinator`] turns carts into orders with an atomic stock
//! reservation and saga-style compensation; [`PaymentCoordinator`]
//! drives payments through the gateway with idempotent webhook
//! handling and a reconciliation poller for payments the provider
//! never settled.

pub mod coordinator;
pub mod error;
pub mod gateway;
pub mod payment;

pub use coordinator::CheckoutCoordinator;
pub use error::{CheckoutError, Result};
pub use gateway::{
    GatewayError, GatewayOutcome, GatewaySession, InMemoryGateway, PaymentGateway, RetryPolicy,
};
pub use payment::{NotificationStatus, PaymentCoordinator, WebhookNotification};
