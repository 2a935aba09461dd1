//! In-memory ledger implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::ProductId;
use tokio::sync::RwLock;

use crate::error::{LedgerError, Result};
use crate::ledger::{InventoryLedger, ProductRecord, Shortage, StockLine, aggregate_lines};

/// In-memory inventory ledger for tests and local development.
///
/// All mutations for one reserve/release call happen under a single
/// write lock, which gives the same all-or-nothing and serialization
/// guarantees the PostgreSQL implementation gets from a transaction
/// with conditional updates.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<RwLock<HashMap<ProductId, ProductRecord>>>,
}

impl InMemoryLedger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the ledger with products. Convenience for tests.
    pub fn with_products(products: impl IntoIterator<Item = ProductRecord>) -> Self {
        let state = products
            .into_iter()
            .map(|product| (product.id.clone(), product))
            .collect();
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Returns the number of catalog entries.
    pub async fn product_count(&self) -> usize {
        self.state.read().await.len()
    }
}

#[async_trait]
impl InventoryLedger for InMemoryLedger {
    async fn upsert_product(&self, product: ProductRecord) -> Result<()> {
        let mut state = self.state.write().await;
        state.insert(product.id.clone(), product);
        Ok(())
    }

    async fn product(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
        Ok(self.state.read().await.get(id).cloned())
    }

    async fn stock_of(&self, id: &ProductId) -> Result<u32> {
        let state = self.state.read().await;
        state
            .get(id)
            .map(|p| p.stock)
            .ok_or_else(|| LedgerError::ProductNotFound(id.to_string()))
    }

    async fn reserve(&self, lines: &[StockLine]) -> Result<()> {
        let totals = aggregate_lines(lines);
        let mut state = self.state.write().await;

        // Check every line before touching any stock.
        let mut shortages = Vec::new();
        for (product_id, requested) in &totals {
            let record = state
                .get(product_id)
                .ok_or_else(|| LedgerError::ProductNotFound(product_id.to_string()))?;
            if record.stock < *requested {
                shortages.push(Shortage {
                    product_id: product_id.clone(),
                    requested: *requested,
                    available: record.stock,
                });
            }
        }
        if !shortages.is_empty() {
            metrics::counter!("stock_reservations_failed_total").increment(1);
            return Err(LedgerError::InsufficientStock { shortages });
        }

        for (product_id, requested) in &totals {
            if let Some(record) = state.get_mut(product_id) {
                record.stock -= requested;
            }
        }

        metrics::counter!("stock_reservations_total").increment(1);
        tracing::debug!(lines = totals.len(), "stock reserved");
        Ok(())
    }

    async fn release(&self, lines: &[StockLine]) -> Result<()> {
        let totals = aggregate_lines(lines);
        let mut state = self.state.write().await;

        for (product_id, _) in &totals {
            if !state.contains_key(product_id) {
                return Err(LedgerError::ProductNotFound(product_id.to_string()));
            }
        }

        for (product_id, quantity) in &totals {
            if let Some(record) = state.get_mut(product_id) {
                record.stock += quantity;
            }
        }

        metrics::counter!("stock_releases_total").increment(1);
        tracing::debug!(lines = totals.len(), "stock released");
        Ok(())
    }
}
