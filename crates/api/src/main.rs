//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::Config;
use checkout::{InMemoryGateway, PaymentGateway};
use common::Money;
use inventory::{InMemoryLedger, InventoryLedger, PostgresLedger, ProductRecord};
use store::{CartRepository, InMemoryStore, OrderRepository, PaymentRepository, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

async fn serve<S, L, G>(state: Arc<api::AppState<S, L, G>>, config: Config)
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // Background poller for payments the provider never settled.
    let poller_state = state.clone();
    let poll_interval = Duration::from_secs(config.reconcile_interval_secs);
    let poller = tokio::spawn(async move {
        poller_state.payments.reconcile_forever(poll_interval).await;
    });

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    poller.abort();
    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let pending_age = chrono::Duration::minutes(config.payment_pending_age_mins);

    match config.database_url.clone() {
        Some(database_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(&database_url)
                .await
                .expect("failed to connect to database");

            let store = PostgresStore::new(pool.clone());
            store.run_migrations().await.expect("migrations failed");

            let state = api::create_state(
                Arc::new(store),
                Arc::new(PostgresLedger::new(pool)),
                Arc::new(InMemoryGateway::new()),
                "mockpay",
                pending_age,
            );
            serve(state, config).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory backends");
            let ledger = InMemoryLedger::with_products(demo_products());
            let state = api::create_state(
                Arc::new(InMemoryStore::new()),
                Arc::new(ledger),
                Arc::new(InMemoryGateway::new()),
                "mockpay",
                pending_age,
            );
            serve(state, config).await;
        }
    }
}

/// Seed catalog for local development.
fn demo_products() -> Vec<ProductRecord> {
    vec![
        ProductRecord {
            id: "SKU-001".into(),
            name: "Cotton T-Shirt".to_string(),
            price: Money::from_minor(19000),
            discount_price: None,
            stock: 100,
            active: true,
        },
        ProductRecord {
            id: "SKU-002".into(),
            name: "Canvas Tote Bag".to_string(),
            price: Money::from_minor(32000),
            discount_price: Some(Money::from_minor(25000)),
            stock: 40,
            active: true,
        },
    ]
}
