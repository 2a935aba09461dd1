//! Repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AccountId, OrderId, PaymentId};
use domain::{Cart, CartOwner, Order, Payment};

use crate::error::Result;

/// Storage for carts, keyed by owner.
///
/// The backend enforces at most one active cart per owner.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Returns the owner's cart, creating an empty one if none exists.
    async fn get_or_create(&self, owner: &CartOwner) -> Result<Cart>;

    /// Returns the owner's cart if one exists.
    async fn find(&self, owner: &CartOwner) -> Result<Option<Cart>>;

    /// Persists the cart (insert or update, keyed by owner).
    async fn save(&self, cart: &Cart) -> Result<()>;

    /// Destroys the owner's cart and, with it, all of its lines.
    async fn delete(&self, owner: &CartOwner) -> Result<()>;
}

/// Storage for orders.
///
/// Orders are inserted once and never deleted; only the status (and
/// its timestamp) is updated afterwards.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Inserts a freshly built order with its item snapshots.
    async fn insert(&self, order: &Order) -> Result<()>;

    /// Looks up an order by ID.
    async fn find(&self, id: OrderId) -> Result<Option<Order>>;

    /// Lists an account's orders, newest first.
    async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<Order>>;

    /// Persists the order's current status and updated-at timestamp.
    async fn update_status(&self, order: &Order) -> Result<()>;
}

/// Storage for payments.
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Inserts a new payment record.
    async fn insert(&self, payment: &Payment) -> Result<()>;

    /// Looks up a payment by ID.
    async fn find(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// Looks up the payment for an order.
    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>>;

    /// Looks up a payment by provider transaction ID (the webhook
    /// idempotency key).
    async fn find_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>>;

    /// Persists the payment's current status, transaction ID, and
    /// updated-at timestamp.
    async fn update(&self, payment: &Payment) -> Result<()>;

    /// Lists payments still `pending` that were created at or before
    /// the cutoff. Used by the reconciliation poller.
    async fn list_pending_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>>;
}
