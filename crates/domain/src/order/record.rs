//! The order record and its line items.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};

use crate::shipping::ShippingAddress;

use super::{OrderError, OrderNumber, OrderStatus};

/// A line in an order, with name and price frozen at order-creation
/// time. Later product changes never affect an existing order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// The product this line was created from.
    pub product_id: ProductId,
    /// Product name snapshot.
    pub product_name: String,
    /// Unit price snapshot in minor units.
    pub unit_price: Money,
    /// Ordered quantity.
    pub quantity: u32,
}

impl OrderItem {
    /// Creates a new order line.
    pub fn new(
        product_id: impl Into<ProductId>,
        product_name: impl Into<String>,
        unit_price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            product_name: product_name.into(),
            unit_price,
            quantity,
        }
    }

    /// Returns the line subtotal (unit price × quantity).
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// An immutable-once-created record of a committed purchase.
///
/// Only the status (and its timestamp) ever changes after creation, and
/// only through the transitions allowed by [`OrderStatus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    number: OrderNumber,
    account_id: AccountId,
    status: OrderStatus,
    items: Vec<OrderItem>,
    shipping_address: ShippingAddress,
    shipping_fee: Money,
    discount: Money,
    total: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a new pending order from snapshotted lines.
    ///
    /// The total is computed here, once: sum of line subtotals plus
    /// shipping fee minus discount.
    pub fn build(
        account_id: AccountId,
        shipping_address: ShippingAddress,
        items: Vec<OrderItem>,
        shipping_fee: Money,
        discount: Money,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    quantity: item.quantity,
                });
            }
            if item.unit_price.is_negative() {
                return Err(OrderError::InvalidPrice {
                    price: item.unit_price.minor(),
                });
            }
        }

        let subtotal: Money = items.iter().map(OrderItem::subtotal).sum();
        let total = subtotal + shipping_fee - discount;
        let now = Utc::now();

        Ok(Self {
            id: OrderId::new(),
            number: OrderNumber::generate(),
            account_id,
            status: OrderStatus::Pending,
            items,
            shipping_address,
            shipping_fee,
            discount,
            total,
            created_at: now,
            updated_at: now,
        })
    }

    /// Reconstructs an order from stored fields. Used by repositories;
    /// totals are trusted as persisted.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OrderId,
        number: OrderNumber,
        account_id: AccountId,
        status: OrderStatus,
        items: Vec<OrderItem>,
        shipping_address: ShippingAddress,
        shipping_fee: Money,
        discount: Money,
        total: Money,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            number,
            account_id,
            status,
            items,
            shipping_address,
            shipping_fee,
            discount,
            total,
            created_at,
            updated_at,
        }
    }

    /// Returns the order ID.
    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Returns the customer-facing order number.
    pub fn number(&self) -> &OrderNumber {
        &self.number
    }

    /// Returns the owning account.
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Returns the current status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the order lines.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the shipping address snapshot.
    pub fn shipping_address(&self) -> &ShippingAddress {
        &self.shipping_address
    }

    /// Returns the shipping fee.
    pub fn shipping_fee(&self) -> Money {
        self.shipping_fee
    }

    /// Returns the discount applied at creation.
    pub fn discount(&self) -> Money {
        self.discount
    }

    /// Returns the final amount: Σ subtotals + shipping − discount.
    pub fn total(&self) -> Money {
        self.total
    }

    /// Returns when the order was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the order was last updated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if this order may be reviewed.
    pub fn can_review(&self) -> bool {
        self.status.can_review()
    }

    /// Applies a status transition, enforcing the allowed table. The
    /// status is left unchanged on failure.
    pub fn transition(&mut self, next: OrderStatus) -> Result<(), OrderError> {
        if !self.status.can_transition(next) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the order paid.
    pub fn mark_paid(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Paid)
    }

    /// Marks the order shipped.
    pub fn ship(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Shipped)
    }

    /// Marks the order delivered.
    pub fn deliver(&mut self) -> Result<(), OrderError> {
        self.transition(OrderStatus::Delivered)
    }

    /// Cancels the order. Returns true if the caller must release the
    /// stock reserved at creation.
    pub fn cancel(&mut self) -> Result<bool, OrderError> {
        let release = self.status.releases_stock_on_cancel();
        self.transition(OrderStatus::Cancelled)?;
        Ok(release)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn two_line_order() -> Order {
        Order::build(
            AccountId::new(),
            address(),
            vec![
                OrderItem::new("SKU-A", "Widget", Money::from_minor(10000), 2),
                OrderItem::new("SKU-B", "Gadget", Money::from_minor(20000), 1),
            ],
            Money::zero(),
            Money::zero(),
        )
        .unwrap()
    }

    #[test]
    fn build_computes_total_from_subtotals() {
        let order = two_line_order();
        assert_eq!(order.total().minor(), 40000);
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn build_applies_shipping_and_discount() {
        let order = Order::build(
            AccountId::new(),
            address(),
            vec![OrderItem::new(
                "SKU-A",
                "Widget",
                Money::from_minor(10000),
                1,
            )],
            Money::from_minor(2500),
            Money::from_minor(1000),
        )
        .unwrap();

        assert_eq!(order.total().minor(), 11500);
    }

    #[test]
    fn build_without_items_fails() {
        let result = Order::build(
            AccountId::new(),
            address(),
            vec![],
            Money::zero(),
            Money::zero(),
        );
        assert!(matches!(result, Err(OrderError::NoItems)));
    }

    #[test]
    fn build_with_zero_quantity_fails() {
        let result = Order::build(
            AccountId::new(),
            address(),
            vec![OrderItem::new(
                "SKU-A",
                "Widget",
                Money::from_minor(10000),
                0,
            )],
            Money::zero(),
            Money::zero(),
        );
        assert!(matches!(result, Err(OrderError::InvalidQuantity { .. })));
    }

    #[test]
    fn item_subtotal() {
        let item = OrderItem::new("SKU-A", "Widget", Money::from_minor(10000), 3);
        assert_eq!(item.subtotal().minor(), 30000);
    }

    #[test]
    fn full_lifecycle() {
        let mut order = two_line_order();
        order.mark_paid().unwrap();
        order.ship().unwrap();
        order.deliver().unwrap();

        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(order.can_review());
    }

    #[test]
    fn invalid_transition_leaves_status_unchanged() {
        let mut order = two_line_order();
        order.mark_paid().unwrap();
        order.ship().unwrap();

        let result = order.transition(OrderStatus::Pending);
        assert!(matches!(
            result,
            Err(OrderError::InvalidStatusTransition { .. })
        ));
        assert_eq!(order.status(), OrderStatus::Shipped);
    }

    #[test]
    fn cancel_from_pending_releases_stock() {
        let mut order = two_line_order();
        let release = order.cancel().unwrap();
        assert!(release);
        assert_eq!(order.status(), OrderStatus::Cancelled);
    }

    #[test]
    fn cancel_from_paid_releases_stock() {
        let mut order = two_line_order();
        order.mark_paid().unwrap();
        let release = order.cancel().unwrap();
        assert!(release);
    }

    #[test]
    fn cancel_after_shipment_fails() {
        let mut order = two_line_order();
        order.mark_paid().unwrap();
        order.ship().unwrap();

        let result = order.cancel();
        assert!(matches!(
            result,
            Err(OrderError::InvalidStatusTransition { .. })
        ));
        assert_eq!(order.status(), OrderStatus::Shipped);
    }

    #[test]
    fn review_requires_delivery() {
        let mut order = two_line_order();
        assert!(!order.can_review());
        order.mark_paid().unwrap();
        assert!(!order.can_review());
    }

    #[test]
    fn serialization_roundtrip() {
        let order = two_line_order();
        let json = serde_json::to_string(&order).unwrap();
        let deserialized: Order = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.id(), order.id());
        assert_eq!(deserialized.number(), order.number());
        assert_eq!(deserialized.total(), order.total());
        assert_eq!(deserialized.items(), order.items());
    }
}
