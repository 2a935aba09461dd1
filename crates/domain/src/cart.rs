//! Cart aggregation: line items collected before checkout.

use chrono::{DateTime, Utc};
use common::{AccountId, CartId, ProductId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity must be greater than zero.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The cart has no line for this product.
    #[error("Item not found in cart: {product_id}")]
    ItemNotFound { product_id: String },

    /// Carts with different owners cannot be merged into each other.
    #[error("Cannot merge a cart into itself")]
    SelfMerge,
}

/// Who a cart belongs to.
///
/// Anonymous visitors are keyed by an opaque session token; the
/// repository guarantees at most one active cart per owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CartOwner {
    /// An authenticated account.
    Account(AccountId),
    /// An anonymous session token.
    Session(String),
}

impl std::fmt::Display for CartOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CartOwner::Account(id) => write!(f, "account:{id}"),
            CartOwner::Session(token) => write!(f, "session:{token}"),
        }
    }
}

impl std::str::FromStr for CartOwner {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some(("account", id)) => {
                let uuid = uuid::Uuid::parse_str(id)
                    .map_err(|e| format!("invalid account id: {e}"))?;
                Ok(CartOwner::Account(AccountId::from_uuid(uuid)))
            }
            Some(("session", token)) if !token.is_empty() => {
                Ok(CartOwner::Session(token.to_string()))
            }
            _ => Err(format!("invalid cart owner: {s}")),
        }
    }
}

/// A single line in a cart.
///
/// Carts hold only the product reference and quantity; prices and names
/// are read from the catalog at checkout time so a cart never carries
/// stale snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// The product (or product/option) this line refers to.
    pub product_id: ProductId,
    /// Requested quantity, always > 0.
    pub quantity: u32,
}

/// A transient collection of candidate purchase lines.
///
/// CartItem is exclusively owned by Cart: destroying a cart destroys its
/// lines. A cart is destroyed (cleared) on successful order creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    owner: CartOwner,
    items: Vec<CartItem>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    /// Creates a new empty cart for the given owner.
    pub fn new(owner: CartOwner) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(),
            owner,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a cart from stored fields. Used by repositories.
    pub fn restore(
        id: CartId,
        owner: CartOwner,
        items: Vec<CartItem>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner,
            items,
            created_at,
            updated_at,
        }
    }

    /// Returns the cart ID.
    pub fn id(&self) -> CartId {
        self.id
    }

    /// Returns the cart owner.
    pub fn owner(&self) -> &CartOwner {
        &self.owner
    }

    /// Returns the cart lines.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the total quantity across all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Returns when the cart was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the cart was last modified.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Adds a line, or increments the quantity of an existing line for
    /// the same product.
    pub fn add_item(&mut self, product_id: ProductId, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity { quantity });
        }

        match self.items.iter_mut().find(|i| i.product_id == product_id) {
            Some(line) => line.quantity += quantity,
            None => self.items.push(CartItem {
                product_id,
                quantity,
            }),
        }
        self.touch();
        Ok(())
    }

    /// Sets the quantity of an existing line. A quantity of zero removes
    /// the line.
    pub fn update_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<(), CartError> {
        let pos = self
            .items
            .iter()
            .position(|i| &i.product_id == product_id)
            .ok_or_else(|| CartError::ItemNotFound {
                product_id: product_id.to_string(),
            })?;

        if quantity == 0 {
            self.items.remove(pos);
        } else {
            self.items[pos].quantity = quantity;
        }
        self.touch();
        Ok(())
    }

    /// Removes a line from the cart.
    pub fn remove_item(&mut self, product_id: &ProductId) -> Result<(), CartError> {
        let pos = self
            .items
            .iter()
            .position(|i| &i.product_id == product_id)
            .ok_or_else(|| CartError::ItemNotFound {
                product_id: product_id.to_string(),
            })?;

        self.items.remove(pos);
        self.touch();
        Ok(())
    }

    /// Removes all lines.
    pub fn clear(&mut self) {
        self.items.clear();
        self.touch();
    }

    /// Merges another cart (typically a guest cart, on login) into this
    /// one. Quantities for matching product lines are summed; the caller
    /// is expected to destroy the source cart afterwards.
    pub fn merge(&mut self, other: &Cart) -> Result<(), CartError> {
        if self.id == other.id {
            return Err(CartError::SelfMerge);
        }

        for line in &other.items {
            match self
                .items
                .iter_mut()
                .find(|i| i.product_id == line.product_id)
            {
                Some(existing) => existing.quantity += line.quantity,
                None => self.items.push(line.clone()),
            }
        }
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account_cart() -> Cart {
        Cart::new(CartOwner::Account(AccountId::new()))
    }

    #[test]
    fn new_cart_is_empty() {
        let cart = account_cart();
        assert!(cart.is_empty());
        assert_eq!(cart.total_quantity(), 0);
    }

    #[test]
    fn add_item_creates_line() {
        let mut cart = account_cart();
        cart.add_item(ProductId::new("SKU-001"), 2).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 2);
    }

    #[test]
    fn add_same_product_increments_quantity() {
        let mut cart = account_cart();
        cart.add_item(ProductId::new("SKU-001"), 2).unwrap();
        cart.add_item(ProductId::new("SKU-001"), 3).unwrap();

        assert_eq!(cart.items().len(), 1);
        assert_eq!(cart.items()[0].quantity, 5);
    }

    #[test]
    fn add_zero_quantity_fails() {
        let mut cart = account_cart();
        let result = cart.add_item(ProductId::new("SKU-001"), 0);
        assert!(matches!(result, Err(CartError::InvalidQuantity { .. })));
        assert!(cart.is_empty());
    }

    #[test]
    fn option_variants_are_distinct_lines() {
        let mut cart = account_cart();
        cart.add_item(ProductId::with_option("SKU-001", "red"), 1)
            .unwrap();
        cart.add_item(ProductId::with_option("SKU-001", "blue"), 1)
            .unwrap();

        assert_eq!(cart.items().len(), 2);
    }

    #[test]
    fn update_quantity_to_zero_removes_line() {
        let mut cart = account_cart();
        cart.add_item(ProductId::new("SKU-001"), 2).unwrap();
        cart.update_quantity(&ProductId::new("SKU-001"), 0).unwrap();

        assert!(cart.is_empty());
    }

    #[test]
    fn update_missing_line_fails() {
        let mut cart = account_cart();
        let result = cart.update_quantity(&ProductId::new("SKU-404"), 1);
        assert!(matches!(result, Err(CartError::ItemNotFound { .. })));
    }

    #[test]
    fn remove_item() {
        let mut cart = account_cart();
        cart.add_item(ProductId::new("SKU-001"), 2).unwrap();
        cart.remove_item(&ProductId::new("SKU-001")).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn merge_sums_matching_lines() {
        let mut account = account_cart();
        account.add_item(ProductId::new("SKU-001"), 2).unwrap();

        let mut guest = Cart::new(CartOwner::Session("tok-abc".to_string()));
        guest.add_item(ProductId::new("SKU-001"), 1).unwrap();
        guest.add_item(ProductId::new("SKU-002"), 4).unwrap();

        account.merge(&guest).unwrap();

        assert_eq!(account.items().len(), 2);
        assert_eq!(account.items()[0].quantity, 3);
        assert_eq!(account.items()[1].quantity, 4);
    }

    #[test]
    fn merge_into_self_fails() {
        let mut cart = account_cart();
        let clone = cart.clone();
        assert!(matches!(cart.merge(&clone), Err(CartError::SelfMerge)));
    }

    #[test]
    fn owner_parse_roundtrip() {
        let account = CartOwner::Account(AccountId::new());
        let session = CartOwner::Session("tok-abc".to_string());

        assert_eq!(account.to_string().parse::<CartOwner>().unwrap(), account);
        assert_eq!(session.to_string().parse::<CartOwner>().unwrap(), session);
        assert!("account:not-a-uuid".parse::<CartOwner>().is_err());
        assert!("visitor:tok".parse::<CartOwner>().is_err());
    }

    #[test]
    fn serialization_roundtrip() {
        let mut cart = Cart::new(CartOwner::Session("tok-1".to_string()));
        cart.add_item(ProductId::new("SKU-001"), 2).unwrap();

        let json = serde_json::to_string(&cart).unwrap();
        let deserialized: Cart = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.id(), cart.id());
        assert_eq!(deserialized.items(), cart.items());
    }
}
