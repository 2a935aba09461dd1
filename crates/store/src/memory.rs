//! In-memory repository implementations for tests and local development.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AccountId, OrderId, PaymentId};
use domain::{Cart, CartOwner, Order, Payment, PaymentStatus};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::repository::{CartRepository, OrderRepository, PaymentRepository};

#[derive(Default)]
struct Inner {
    carts: HashMap<String, Cart>,
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
}

/// In-memory store implementing all three repositories.
///
/// Carts are keyed by the owner string, which is what gives the
/// one-active-cart-per-owner guarantee (the SQL backend gets the same
/// from a unique index).
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    /// Returns the number of stored payments.
    pub async fn payment_count(&self) -> usize {
        self.inner.read().await.payments.len()
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn get_or_create(&self, owner: &CartOwner) -> Result<Cart> {
        let mut inner = self.inner.write().await;
        let cart = inner
            .carts
            .entry(owner.to_string())
            .or_insert_with(|| Cart::new(owner.clone()));
        Ok(cart.clone())
    }

    async fn find(&self, owner: &CartOwner) -> Result<Option<Cart>> {
        Ok(self.inner.read().await.carts.get(&owner.to_string()).cloned())
    }

    async fn save(&self, cart: &Cart) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.carts.insert(cart.owner().to_string(), cart.clone());
        Ok(())
    }

    async fn delete(&self, owner: &CartOwner) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.carts.remove(&owner.to_string());
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.orders.insert(order.id(), order.clone());
        Ok(())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner
            .orders
            .values()
            .filter(|o| o.account_id() == account_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        Ok(orders)
    }

    async fn update_status(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.orders.get_mut(&order.id()) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "order",
                id: order.id().to_string(),
            }),
        }
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.payments.insert(payment.id(), payment.clone());
        Ok(())
    }

    async fn find(&self, id: PaymentId) -> Result<Option<Payment>> {
        Ok(self.inner.read().await.payments.get(&id).cloned())
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .filter(|p| p.order_id() == order_id)
            .max_by_key(|p| p.created_at())
            .cloned())
    }

    async fn find_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .find(|p| p.transaction_id() == Some(transaction_id))
            .cloned())
    }

    async fn update(&self, payment: &Payment) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.payments.get_mut(&payment.id()) {
            Some(stored) => {
                *stored = payment.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                entity: "payment",
                id: payment.id().to_string(),
            }),
        }
    }

    async fn list_pending_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .filter(|p| p.status() == PaymentStatus::Pending && p.created_at() <= cutoff)
            .cloned()
            .collect())
    }
}
