//! PostgreSQL repository implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{AccountId, CartId, OrderId, PaymentId};
use domain::{
    Cart, CartItem, CartOwner, Order, OrderItem, OrderNumber, Payment, ShippingAddress,
};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::repository::{CartRepository, OrderRepository, PaymentRepository};

/// PostgreSQL-backed store implementing all three repositories.
///
/// Item snapshots and shipping addresses are persisted as JSONB; the
/// unique index on `carts.owner_key` enforces one active cart per
/// owner.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_cart(row: &PgRow) -> Result<Cart> {
        let owner: CartOwner = serde_json::from_value(row.try_get("owner")?)?;
        let items: Vec<CartItem> = serde_json::from_value(row.try_get("items")?)?;

        Ok(Cart::restore(
            CartId::from_uuid(row.try_get::<Uuid, _>("id")?),
            owner,
            items,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let items: Vec<OrderItem> = serde_json::from_value(row.try_get("items")?)?;
        let shipping_address: ShippingAddress =
            serde_json::from_value(row.try_get("shipping_address")?)?;
        let status = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Decode)?;

        Ok(Order::restore(
            OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            OrderNumber::from_string(row.try_get::<String, _>("order_number")?),
            AccountId::from_uuid(row.try_get::<Uuid, _>("account_id")?),
            status,
            items,
            shipping_address,
            common::Money::from_minor(row.try_get("shipping_fee")?),
            common::Money::from_minor(row.try_get("discount")?),
            common::Money::from_minor(row.try_get("total")?),
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }

    fn row_to_payment(row: &PgRow) -> Result<Payment> {
        let status = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Decode)?;

        Ok(Payment::restore(
            PaymentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            OrderId::from_uuid(row.try_get::<Uuid, _>("order_id")?),
            row.try_get("provider")?,
            row.try_get("transaction_id")?,
            common::Money::from_minor(row.try_get("amount")?),
            status,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        ))
    }
}

#[async_trait]
impl CartRepository for PostgresStore {
    async fn get_or_create(&self, owner: &CartOwner) -> Result<Cart> {
        if let Some(cart) = CartRepository::find(self, owner).await? {
            return Ok(cart);
        }

        let cart = Cart::new(owner.clone());
        // A concurrent request may have created the cart between the
        // lookup and this insert; the unique owner_key makes the insert
        // a no-op in that case and the re-read returns the winner.
        sqlx::query(
            r#"
            INSERT INTO carts (id, owner_key, owner, items, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (owner_key) DO NOTHING
            "#,
        )
        .bind(cart.id().as_uuid())
        .bind(owner.to_string())
        .bind(serde_json::to_value(owner)?)
        .bind(serde_json::to_value(cart.items())?)
        .bind(cart.created_at())
        .bind(cart.updated_at())
        .execute(&self.pool)
        .await?;

        CartRepository::find(self, owner)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "cart",
                id: owner.to_string(),
            })
    }

    async fn find(&self, owner: &CartOwner) -> Result<Option<Cart>> {
        let row = sqlx::query(
            "SELECT id, owner, items, created_at, updated_at FROM carts WHERE owner_key = $1",
        )
        .bind(owner.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_cart).transpose()
    }

    async fn save(&self, cart: &Cart) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, owner_key, owner, items, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (owner_key) DO UPDATE
            SET items = $4, updated_at = $6
            "#,
        )
        .bind(cart.id().as_uuid())
        .bind(cart.owner().to_string())
        .bind(serde_json::to_value(cart.owner())?)
        .bind(serde_json::to_value(cart.items())?)
        .bind(cart.created_at())
        .bind(cart.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, owner: &CartOwner) -> Result<()> {
        sqlx::query("DELETE FROM carts WHERE owner_key = $1")
            .bind(owner.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderRepository for PostgresStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders
                (id, order_number, account_id, status, items, shipping_address,
                 shipping_fee, discount, total, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(order.id().as_uuid())
        .bind(order.number().as_str())
        .bind(order.account_id().as_uuid())
        .bind(order.status().as_str())
        .bind(serde_json::to_value(order.items())?)
        .bind(serde_json::to_value(order.shipping_address())?)
        .bind(order.shipping_fee().minor())
        .bind(order.discount().minor())
        .bind(order.total().minor())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let rows =
            sqlx::query("SELECT * FROM orders WHERE account_id = $1 ORDER BY created_at DESC")
                .bind(account_id.as_uuid())
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn update_status(&self, order: &Order) -> Result<()> {
        let updated = sqlx::query("UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(order.id().as_uuid())
            .bind(order.status().as_str())
            .bind(order.updated_at())
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "order",
                id: order.id().to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for PostgresStore {
    async fn insert(&self, payment: &Payment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO payments
                (id, order_id, provider, transaction_id, amount, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.order_id().as_uuid())
        .bind(payment.provider())
        .bind(payment.transaction_id())
        .bind(payment.amount().minor())
        .bind(payment.status().as_str())
        .bind(payment.created_at())
        .bind(payment.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, id: PaymentId) -> Result<Option<Payment>> {
        let row = sqlx::query("SELECT * FROM payments WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }

    async fn find_by_order(&self, order_id: OrderId) -> Result<Option<Payment>> {
        let row = sqlx::query(
            "SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at DESC LIMIT 1",
        )
        .bind(order_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }

    async fn find_by_transaction(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let row = sqlx::query("SELECT * FROM payments WHERE transaction_id = $1")
            .bind(transaction_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_payment).transpose()
    }

    async fn update(&self, payment: &Payment) -> Result<()> {
        let updated = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, transaction_id = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(payment.id().as_uuid())
        .bind(payment.status().as_str())
        .bind(payment.transaction_id())
        .bind(payment.updated_at())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                entity: "payment",
                id: payment.id().to_string(),
            });
        }
        Ok(())
    }

    async fn list_pending_created_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Payment>> {
        let rows = sqlx::query(
            "SELECT * FROM payments WHERE status = 'pending' AND created_at <= $1",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_payment).collect()
    }
}
