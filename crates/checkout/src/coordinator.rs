//! Checkout coordinator: turns a cart into an immutable order.

use std::sync::Arc;

use common::{AccountId, Money, OrderId};
use domain::{CartOwner, Order, OrderItem, ShippingAddress};
use inventory::{InventoryLedger, StockLine};
use store::{CartRepository, OrderRepository};

use crate::error::{CheckoutError, Result};

/// Orchestrates order placement against the stock ledger and the
/// repositories.
///
/// Checkout is a reserve-then-persist sequence with compensation:
/// stock is reserved atomically first, and released again if any later
/// step fails, so a failed checkout leaves no visible mutation.
pub struct CheckoutCoordinator<S, L>
where
    S: CartRepository + OrderRepository,
    L: InventoryLedger,
{
    store: Arc<S>,
    ledger: Arc<L>,
}

impl<S, L> CheckoutCoordinator<S, L>
where
    S: CartRepository + OrderRepository,
    L: InventoryLedger,
{
    /// Creates a new checkout coordinator.
    pub fn new(store: Arc<S>, ledger: Arc<L>) -> Self {
        Self { store, ledger }
    }

    /// Places an order from the account's cart.
    ///
    /// Preconditions: the cart is non-empty and every line's quantity is
    /// coverable by current stock. On success the stock is decremented,
    /// the order is persisted with price and name snapshots frozen at
    /// this moment, and the cart is destroyed. Any failure after the
    /// reservation releases the reserved stock before returning.
    #[tracing::instrument(skip(self, address), fields(account_id = %account_id))]
    pub async fn place_order(
        &self,
        account_id: AccountId,
        address: ShippingAddress,
        shipping_fee: Money,
        discount: Money,
    ) -> Result<Order> {
        metrics::counter!("checkout_attempts_total").increment(1);

        let owner = CartOwner::Account(account_id);
        let cart = CartRepository::find(self.store.as_ref(), &owner)
            .await?
            .ok_or(CheckoutError::EmptyCart)?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        // Snapshot names and effective prices from the catalog before
        // touching stock, so a reservation is never held across
        // catalog lookups.
        let mut stock_lines = Vec::with_capacity(cart.items().len());
        let mut order_items = Vec::with_capacity(cart.items().len());
        for line in cart.items() {
            let product = self
                .ledger
                .product(&line.product_id)
                .await?
                .filter(|p| p.active)
                .ok_or_else(|| CheckoutError::ProductUnavailable(line.product_id.to_string()))?;

            let unit_price = product.effective_price();
            stock_lines.push(StockLine::new(line.product_id.clone(), line.quantity));
            order_items.push(OrderItem::new(
                line.product_id.clone(),
                product.name,
                unit_price,
                line.quantity,
            ));
        }

        self.ledger.reserve(&stock_lines).await?;

        let order = match Order::build(account_id, address, order_items, shipping_fee, discount) {
            Ok(order) => order,
            Err(err) => {
                self.compensate(&stock_lines).await;
                return Err(err.into());
            }
        };

        if let Err(err) = OrderRepository::insert(self.store.as_ref(), &order).await {
            self.compensate(&stock_lines).await;
            return Err(err.into());
        }

        // The order is committed; a stale cart is harmless, so cart
        // cleanup failure is logged rather than compensated.
        if let Err(err) = self.store.delete(&owner).await {
            tracing::warn!(order_id = %order.id(), error = %err, "failed to clear cart after checkout");
        }

        metrics::counter!("checkout_orders_placed_total").increment(1);
        tracing::info!(
            order_id = %order.id(),
            order_number = %order.number(),
            total = order.total().minor(),
            "order placed"
        );
        Ok(order)
    }

    /// Marks a paid order as shipped.
    pub async fn ship(&self, order_id: OrderId) -> Result<Order> {
        self.transition(order_id, Order::ship).await
    }

    /// Marks a shipped order as delivered.
    pub async fn deliver(&self, order_id: OrderId) -> Result<Order> {
        self.transition(order_id, Order::deliver).await
    }

    /// Looks up an order.
    pub async fn order(&self, order_id: OrderId) -> Result<Order> {
        OrderRepository::find(self.store.as_ref(), order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    /// Lists an account's orders, newest first.
    pub async fn orders_for(&self, account_id: AccountId) -> Result<Vec<Order>> {
        Ok(self.store.list_for_account(account_id).await?)
    }

    async fn transition(
        &self,
        order_id: OrderId,
        apply: fn(&mut Order) -> std::result::Result<(), domain::OrderError>,
    ) -> Result<Order> {
        let mut order = self.order(order_id).await?;
        apply(&mut order)?;
        self.store.update_status(&order).await?;
        tracing::info!(order_id = %order.id(), status = %order.status(), "order transitioned");
        Ok(order)
    }

    async fn compensate(&self, lines: &[StockLine]) {
        if let Err(err) = self.ledger.release(lines).await {
            // Leaves stock under-counted; needs operator attention.
            tracing::error!(error = %err, "failed to release reserved stock during compensation");
        }
        metrics::counter!("checkout_compensations_total").increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Money, ProductId};
    use inventory::{InMemoryLedger, LedgerError, ProductRecord};
    use store::InMemoryStore;

    fn product(id: &str, price: i64, stock: u32) -> ProductRecord {
        ProductRecord {
            id: ProductId::new(id),
            name: format!("Product {id}"),
            price: Money::from_minor(price),
            discount_price: None,
            stock,
            active: true,
        }
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            recipient: "Jane Doe".to_string(),
            phone: "010-1234-5678".to_string(),
            line1: "1 Main St".to_string(),
            line2: None,
            city: "Seoul".to_string(),
            postal_code: "04524".to_string(),
        }
    }

    async fn seed_cart(store: &InMemoryStore, account_id: AccountId, lines: &[(&str, u32)]) {
        let owner = CartOwner::Account(account_id);
        let mut cart = store.get_or_create(&owner).await.unwrap();
        for (id, qty) in lines {
            cart.add_item(ProductId::new(*id), *qty).unwrap();
        }
        store.save(&cart).await.unwrap();
    }

    fn coordinator(
        store: &Arc<InMemoryStore>,
        ledger: &Arc<InMemoryLedger>,
    ) -> CheckoutCoordinator<InMemoryStore, InMemoryLedger> {
        CheckoutCoordinator::new(store.clone(), ledger.clone())
    }

    #[tokio::test]
    async fn place_order_snapshots_prices_and_decrements_stock() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(InMemoryLedger::with_products(vec![
            product("SKU-A", 10000, 10),
            product("SKU-B", 20000, 5),
        ]));
        let account_id = AccountId::new();
        seed_cart(&store, account_id, &[("SKU-A", 2), ("SKU-B", 1)]).await;

        let order = coordinator(&store, &ledger)
            .place_order(account_id, address(), Money::zero(), Money::zero())
            .await
            .unwrap();

        assert_eq!(order.total(), Money::from_minor(40000));
        assert_eq!(ledger.stock_of(&ProductId::new("SKU-A")).await.unwrap(), 8);
        assert_eq!(ledger.stock_of(&ProductId::new("SKU-B")).await.unwrap(), 4);

        // Cart is destroyed on success.
        let owner = CartOwner::Account(account_id);
        assert!(CartRepository::find(store.as_ref(), &owner)
            .await
            .unwrap()
            .is_none());

        // The order is persisted.
        let found = OrderRepository::find(store.as_ref(), order.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.number(), order.number());
    }

    #[tokio::test]
    async fn discount_price_is_snapshotted() {
        let store = Arc::new(InMemoryStore::new());
        let mut sale = product("SKU-A", 10000, 10);
        sale.discount_price = Some(Money::from_minor(8000));
        let ledger = Arc::new(InMemoryLedger::with_products(vec![sale]));
        let account_id = AccountId::new();
        seed_cart(&store, account_id, &[("SKU-A", 1)]).await;

        let order = coordinator(&store, &ledger)
            .place_order(account_id, address(), Money::zero(), Money::zero())
            .await
            .unwrap();

        assert_eq!(order.items()[0].unit_price, Money::from_minor(8000));
        assert_eq!(order.total(), Money::from_minor(8000));
    }

    #[tokio::test]
    async fn shipping_and_discount_shape_the_total() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(InMemoryLedger::with_products(vec![product(
            "SKU-A", 10000, 10,
        )]));
        let account_id = AccountId::new();
        seed_cart(&store, account_id, &[("SKU-A", 2)]).await;

        let order = coordinator(&store, &ledger)
            .place_order(
                account_id,
                address(),
                Money::from_minor(3000),
                Money::from_minor(1000),
            )
            .await
            .unwrap();

        assert_eq!(order.total(), Money::from_minor(22000));
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let account_id = AccountId::new();

        let result = coordinator(&store, &ledger)
            .place_order(account_id, address(), Money::zero(), Money::zero())
            .await;
        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }

    #[tokio::test]
    async fn insufficient_stock_names_every_offending_line() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(InMemoryLedger::with_products(vec![
            product("SKU-A", 10000, 1),
            product("SKU-B", 20000, 0),
        ]));
        let account_id = AccountId::new();
        seed_cart(&store, account_id, &[("SKU-A", 5), ("SKU-B", 1)]).await;

        let result = coordinator(&store, &ledger)
            .place_order(account_id, address(), Money::zero(), Money::zero())
            .await;

        match result {
            Err(CheckoutError::Ledger(LedgerError::InsufficientStock { shortages })) => {
                assert_eq!(shortages.len(), 2);
                assert_eq!(shortages[0].requested, 5);
                assert_eq!(shortages[0].available, 1);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        // Nothing was mutated.
        assert_eq!(ledger.stock_of(&ProductId::new("SKU-A")).await.unwrap(), 1);
        assert_eq!(store.order_count().await, 0);
        let owner = CartOwner::Account(account_id);
        assert!(CartRepository::find(store.as_ref(), &owner)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn inactive_product_is_rejected_before_reservation() {
        let store = Arc::new(InMemoryStore::new());
        let mut retired = product("SKU-A", 10000, 10);
        retired.active = false;
        let ledger = Arc::new(InMemoryLedger::with_products(vec![retired]));
        let account_id = AccountId::new();
        seed_cart(&store, account_id, &[("SKU-A", 1)]).await;

        let result = coordinator(&store, &ledger)
            .place_order(account_id, address(), Money::zero(), Money::zero())
            .await;
        assert!(matches!(result, Err(CheckoutError::ProductUnavailable(_))));
        assert_eq!(ledger.stock_of(&ProductId::new("SKU-A")).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn ship_and_deliver_follow_the_state_machine() {
        let store = Arc::new(InMemoryStore::new());
        let ledger = Arc::new(InMemoryLedger::with_products(vec![product(
            "SKU-A", 10000, 10,
        )]));
        let account_id = AccountId::new();
        seed_cart(&store, account_id, &[("SKU-A", 1)]).await;

        let coordinator = coordinator(&store, &ledger);
        let order = coordinator
            .place_order(account_id, address(), Money::zero(), Money::zero())
            .await
            .unwrap();

        // Shipping an unpaid order is refused.
        let result = coordinator.ship(order.id()).await;
        assert!(matches!(
            result,
            Err(CheckoutError::Order(
                domain::OrderError::InvalidStatusTransition { .. }
            ))
        ));

        let mut paid = coordinator.order(order.id()).await.unwrap();
        paid.mark_paid().unwrap();
        store.update_status(&paid).await.unwrap();

        let shipped = coordinator.ship(order.id()).await.unwrap();
        assert_eq!(shipped.status(), domain::OrderStatus::Shipped);

        let delivered = coordinator.deliver(order.id()).await.unwrap();
        assert_eq!(delivered.status(), domain::OrderStatus::Delivered);
        assert!(delivered.status().can_review());
    }
}
