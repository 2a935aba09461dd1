//! HTTP API server for carts, checkout, orders, and payments.
//!
//! Provides REST endpoints over the checkout and payment coordinators,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, patch, post};
use checkout::{CheckoutCoordinator, InMemoryGateway, PaymentCoordinator, PaymentGateway};
use inventory::{InMemoryLedger, InventoryLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{CartRepository, InMemoryStore, OrderRepository, PaymentRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state accessible from all handlers.
pub struct AppState<S, L, G>
where
    S: CartRepository + OrderRepository + PaymentRepository,
    L: InventoryLedger,
    G: PaymentGateway,
{
    pub store: Arc<S>,
    pub ledger: Arc<L>,
    pub gateway: Arc<G>,
    pub checkout: CheckoutCoordinator<S, L>,
    pub payments: PaymentCoordinator<S, L, G>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, L, G>(
    state: Arc<AppState<S, L, G>>,
    metrics_handle: PrometheusHandle,
) -> Router
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/carts/{owner}", get(routes::carts::get::<S, L, G>))
        .route("/carts/{owner}/items", post(routes::carts::add_item::<S, L, G>))
        .route(
            "/carts/{owner}/items",
            patch(routes::carts::update_item::<S, L, G>),
        )
        .route(
            "/carts/{owner}/items/{product}",
            delete(routes::carts::remove_item::<S, L, G>),
        )
        .route("/carts/{owner}/merge", post(routes::carts::merge::<S, L, G>))
        .route("/checkout", post(routes::orders::place::<S, L, G>))
        .route("/orders/{id}", get(routes::orders::get::<S, L, G>))
        .route(
            "/accounts/{account_id}/orders",
            get(routes::orders::list_for_account::<S, L, G>),
        )
        .route("/orders/{id}/pay", post(routes::orders::pay::<S, L, G>))
        .route("/orders/{id}/ship", post(routes::orders::ship::<S, L, G>))
        .route(
            "/orders/{id}/deliver",
            post(routes::orders::deliver::<S, L, G>),
        )
        .route(
            "/orders/{id}/cancel",
            post(routes::orders::cancel::<S, L, G>),
        )
        .route(
            "/payments/webhook",
            post(routes::payments::webhook::<S, L, G>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over the given backends.
pub fn create_state<S, L, G>(
    store: Arc<S>,
    ledger: Arc<L>,
    gateway: Arc<G>,
    provider: &str,
    pending_age: chrono::Duration,
) -> Arc<AppState<S, L, G>>
where
    S: CartRepository + OrderRepository + PaymentRepository,
    L: InventoryLedger,
    G: PaymentGateway,
{
    let checkout = CheckoutCoordinator::new(store.clone(), ledger.clone());
    let payments = PaymentCoordinator::new(store.clone(), ledger.clone(), gateway.clone(), provider)
        .with_pending_age(pending_age);

    Arc::new(AppState {
        store,
        ledger,
        gateway,
        checkout,
        payments,
    })
}

/// Creates state over the in-memory backends and the mock gateway.
pub fn create_default_state() -> Arc<AppState<InMemoryStore, InMemoryLedger, InMemoryGateway>> {
    create_state(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryLedger::new()),
        Arc::new(InMemoryGateway::new()),
        "mockpay",
        chrono::Duration::minutes(30),
    )
}
