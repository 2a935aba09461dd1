//! PostgreSQL ledger integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p inventory --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{Money, ProductId};
use inventory::{InventoryLedger, LedgerError, PostgresLedger, ProductRecord, StockLine};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_orderflow_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh ledger with its own pool and cleared tables
async fn get_test_ledger() -> PostgresLedger {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE payments, orders, carts, products")
        .execute(&pool)
        .await
        .unwrap();

    PostgresLedger::new(pool)
}

fn make_product(id: &str, stock: u32) -> ProductRecord {
    ProductRecord {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        price: Money::from_minor(10000),
        discount_price: None,
        stock,
        active: true,
    }
}

#[tokio::test]
async fn upsert_and_fetch_product() {
    let ledger = get_test_ledger().await;

    ledger.upsert_product(make_product("SKU-001", 10)).await.unwrap();

    let product = ledger
        .product(&ProductId::new("SKU-001"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.name, "Product SKU-001");
    assert_eq!(product.stock, 10);
    assert!(product.active);
}

#[tokio::test]
async fn reserve_and_release_roundtrip() {
    let ledger = get_test_ledger().await;
    ledger.upsert_product(make_product("SKU-001", 10)).await.unwrap();
    ledger.upsert_product(make_product("SKU-002", 5)).await.unwrap();

    let lines = [StockLine::new("SKU-001", 2), StockLine::new("SKU-002", 1)];
    ledger.reserve(&lines).await.unwrap();

    assert_eq!(ledger.stock_of(&ProductId::new("SKU-001")).await.unwrap(), 8);
    assert_eq!(ledger.stock_of(&ProductId::new("SKU-002")).await.unwrap(), 4);

    ledger.release(&lines).await.unwrap();

    assert_eq!(ledger.stock_of(&ProductId::new("SKU-001")).await.unwrap(), 10);
    assert_eq!(ledger.stock_of(&ProductId::new("SKU-002")).await.unwrap(), 5);
}

#[tokio::test]
async fn over_reserve_rolls_back_every_line() {
    let ledger = get_test_ledger().await;
    ledger.upsert_product(make_product("SKU-001", 10)).await.unwrap();
    ledger.upsert_product(make_product("SKU-002", 1)).await.unwrap();

    let result = ledger
        .reserve(&[StockLine::new("SKU-001", 2), StockLine::new("SKU-002", 5)])
        .await;

    match result {
        Err(LedgerError::InsufficientStock { shortages }) => {
            assert_eq!(shortages.len(), 1);
            assert_eq!(shortages[0].product_id.as_str(), "SKU-002");
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(ledger.stock_of(&ProductId::new("SKU-001")).await.unwrap(), 10);
    assert_eq!(ledger.stock_of(&ProductId::new("SKU-002")).await.unwrap(), 1);
}

#[tokio::test]
async fn concurrent_last_unit_reservations() {
    let ledger = get_test_ledger().await;
    ledger.upsert_product(make_product("SKU-001", 1)).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..2 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.reserve(&[StockLine::new("SKU-001", 1)]).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(ledger.stock_of(&ProductId::new("SKU-001")).await.unwrap(), 0);
}

#[tokio::test]
async fn release_unknown_product_fails() {
    let ledger = get_test_ledger().await;
    let result = ledger.release(&[StockLine::new("SKU-404", 1)]).await;
    assert!(matches!(result, Err(LedgerError::ProductNotFound(_))));
}
