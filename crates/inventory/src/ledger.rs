//! Ledger trait and its value types.

use async_trait::async_trait;
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Catalog entry the ledger tracks stock for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    /// Product (or product/option) identifier.
    pub id: ProductId,
    /// Display name, snapshotted into orders at checkout.
    pub name: String,
    /// Regular unit price.
    pub price: Money,
    /// Discounted unit price, if a promotion is running.
    pub discount_price: Option<Money>,
    /// Units currently available. Never negative.
    pub stock: u32,
    /// Inactive products cannot be checked out.
    pub active: bool,
}

impl ProductRecord {
    /// Returns the price a checkout should snapshot: the discount price
    /// when present, the regular price otherwise.
    pub fn effective_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }
}

/// One product/quantity pair in a reserve or release request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLine {
    /// The product to adjust.
    pub product_id: ProductId,
    /// Quantity to reserve or release.
    pub quantity: u32,
}

impl StockLine {
    /// Creates a new stock line.
    pub fn new(product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A line that could not be reserved, with the quantities involved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    /// The product lacking stock.
    pub product_id: ProductId,
    /// Quantity the caller asked for.
    pub requested: u32,
    /// Quantity actually available.
    pub available: u32,
}

/// Folds request lines into per-product totals, preserving first-seen
/// order so duplicate lines for one product are checked as a single
/// requirement and error messages stay deterministic.
pub(crate) fn aggregate_lines(lines: &[StockLine]) -> Vec<(ProductId, u32)> {
    let mut totals: Vec<(ProductId, u32)> = Vec::new();
    for line in lines {
        match totals.iter_mut().find(|(id, _)| id == &line.product_id) {
            Some((_, qty)) => *qty += line.quantity,
            None => totals.push((line.product_id.clone(), line.quantity)),
        }
    }
    totals
}

/// Atomic stock accounting keyed by product identifier.
///
/// Invariant: for any product,
/// `initial stock − Σ(reserved, not yet released) = current stock`,
/// and current stock is never negative.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// Inserts or replaces a catalog entry.
    async fn upsert_product(&self, product: ProductRecord) -> Result<()>;

    /// Looks up a catalog entry.
    async fn product(&self, id: &ProductId) -> Result<Option<ProductRecord>>;

    /// Returns the current stock quantity for a product.
    async fn stock_of(&self, id: &ProductId) -> Result<u32>;

    /// Atomically decrements stock for every line, or none.
    ///
    /// Fails with [`crate::LedgerError::InsufficientStock`] naming every
    /// offending line if any decrement would go negative; no stock is
    /// mutated on failure.
    async fn reserve(&self, lines: &[StockLine]) -> Result<()>;

    /// Restores previously reserved quantities.
    ///
    /// Fails only if a product is unknown to the ledger.
    async fn release(&self, lines: &[StockLine]) -> Result<()>;
}
