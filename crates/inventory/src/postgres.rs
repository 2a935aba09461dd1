//! PostgreSQL-backed ledger implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use common::{Money, ProductId};
use sqlx::{PgPool, Row};

use crate::error::{LedgerError, Result};
use crate::ledger::{InventoryLedger, ProductRecord, Shortage, StockLine, aggregate_lines};

/// Inventory ledger backed by a `products` table.
///
/// Reservations take row-level locks (`SELECT ... FOR UPDATE`, ordered
/// by product ID to avoid deadlocks between multi-line reservations),
/// check every line, then decrement inside the same transaction. A
/// failed check rolls back without mutating anything.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_product(row: &sqlx::postgres::PgRow) -> Result<ProductRecord> {
        Ok(ProductRecord {
            id: ProductId::new(row.try_get::<String, _>("id")?),
            name: row.try_get("name")?,
            price: Money::from_minor(row.try_get("price")?),
            discount_price: row
                .try_get::<Option<i64>, _>("discount_price")?
                .map(Money::from_minor),
            stock: row.try_get::<i64, _>("stock")? as u32,
            active: row.try_get("active")?,
        })
    }
}

#[async_trait]
impl InventoryLedger for PostgresLedger {
    async fn upsert_product(&self, product: ProductRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, discount_price, stock, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET name = $2, price = $3, discount_price = $4, stock = $5, active = $6
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(product.price.minor())
        .bind(product.discount_price.map(|m| m.minor()))
        .bind(i64::from(product.stock))
        .bind(product.active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn product(&self, id: &ProductId) -> Result<Option<ProductRecord>> {
        let row = sqlx::query(
            "SELECT id, name, price, discount_price, stock, active FROM products WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_product).transpose()
    }

    async fn stock_of(&self, id: &ProductId) -> Result<u32> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        stock
            .map(|s| s as u32)
            .ok_or_else(|| LedgerError::ProductNotFound(id.to_string()))
    }

    async fn reserve(&self, lines: &[StockLine]) -> Result<()> {
        let totals = aggregate_lines(lines);
        let ids: Vec<String> = totals.iter().map(|(id, _)| id.to_string()).collect();

        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query(
            "SELECT id, stock FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&ids)
        .fetch_all(&mut *tx)
        .await?;

        let mut current: HashMap<String, i64> = HashMap::with_capacity(rows.len());
        for row in &rows {
            current.insert(row.try_get("id")?, row.try_get("stock")?);
        }

        let mut shortages = Vec::new();
        for (product_id, requested) in &totals {
            let available = *current
                .get(product_id.as_str())
                .ok_or_else(|| LedgerError::ProductNotFound(product_id.to_string()))?;
            if available < i64::from(*requested) {
                shortages.push(Shortage {
                    product_id: product_id.clone(),
                    requested: *requested,
                    available: available as u32,
                });
            }
        }
        if !shortages.is_empty() {
            metrics::counter!("stock_reservations_failed_total").increment(1);
            // Dropping the transaction rolls back the row locks.
            return Err(LedgerError::InsufficientStock { shortages });
        }

        for (product_id, requested) in &totals {
            sqlx::query("UPDATE products SET stock = stock - $2 WHERE id = $1")
                .bind(product_id.as_str())
                .bind(i64::from(*requested))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        metrics::counter!("stock_reservations_total").increment(1);
        tracing::debug!(lines = totals.len(), "stock reserved");
        Ok(())
    }

    async fn release(&self, lines: &[StockLine]) -> Result<()> {
        let totals = aggregate_lines(lines);
        let mut tx = self.pool.begin().await?;

        for (product_id, quantity) in &totals {
            let updated = sqlx::query("UPDATE products SET stock = stock + $2 WHERE id = $1")
                .bind(product_id.as_str())
                .bind(i64::from(*quantity))
                .execute(&mut *tx)
                .await?;

            if updated.rows_affected() == 0 {
                return Err(LedgerError::ProductNotFound(product_id.to_string()));
            }
        }

        tx.commit().await?;
        metrics::counter!("stock_releases_total").increment(1);
        tracing::debug!(lines = totals.len(), "stock released");
        Ok(())
    }
}
