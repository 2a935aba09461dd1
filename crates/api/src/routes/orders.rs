//! Checkout and order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::PaymentGateway;
use common::{AccountId, Money, OrderId};
use domain::{Order, Payment, ShippingAddress};
use inventory::InventoryLedger;
use serde::{Deserialize, Serialize};
use store::{CartRepository, OrderRepository, PaymentRepository};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub account_id: String,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub shipping_fee_minor: i64,
    #[serde(default)]
    pub discount_minor: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price_minor: i64,
    pub subtotal_minor: i64,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub account_id: String,
    pub status: String,
    pub items: Vec<OrderItemResponse>,
    pub shipping_fee_minor: i64,
    pub discount_minor: i64,
    pub total_minor: i64,
    pub can_review: bool,
}

#[derive(Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub order_id: String,
    pub provider: String,
    pub transaction_id: Option<String>,
    pub status: String,
    pub amount_minor: i64,
}

impl OrderResponse {
    pub(crate) fn from_order(order: &Order) -> Self {
        Self {
            id: order.id().to_string(),
            order_number: order.number().to_string(),
            account_id: order.account_id().to_string(),
            status: order.status().to_string(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    unit_price_minor: item.unit_price.minor(),
                    subtotal_minor: item.subtotal().minor(),
                })
                .collect(),
            shipping_fee_minor: order.shipping_fee().minor(),
            discount_minor: order.discount().minor(),
            total_minor: order.total().minor(),
            can_review: order.status().can_review(),
        }
    }
}

impl PaymentResponse {
    pub(crate) fn from_payment(payment: &Payment) -> Self {
        Self {
            id: payment.id().to_string(),
            order_id: payment.order_id().to_string(),
            provider: payment.provider().to_string(),
            transaction_id: payment.transaction_id().map(String::from),
            status: payment.status().to_string(),
            amount_minor: payment.amount().minor(),
        }
    }
}

// -- Handlers --

/// POST /checkout — place an order from the account's cart.
#[tracing::instrument(skip(state, req))]
pub async fn place<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(axum::http::StatusCode, Json<OrderResponse>), ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let account_id = parse_account_id(&req.account_id)?;
    let order = state
        .checkout
        .place_order(
            account_id,
            req.shipping_address,
            Money::from_minor(req.shipping_fee_minor),
            Money::from_minor(req.discount_minor),
        )
        .await?;

    Ok((
        axum::http::StatusCode::CREATED,
        Json(OrderResponse::from_order(&order)),
    ))
}

/// GET /orders/{id} — look up an order.
#[tracing::instrument(skip(state))]
pub async fn get<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let order = state.checkout.order(parse_order_id(&id)?).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// GET /accounts/{account_id}/orders — an account's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list_for_account<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path(account_id): Path<String>,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let account_id = parse_account_id(&account_id)?;
    let orders = state.checkout.orders_for(account_id).await?;
    Ok(Json(orders.iter().map(OrderResponse::from_order).collect()))
}

/// POST /orders/{id}/pay — open a gateway session for a pending order.
#[tracing::instrument(skip(state))]
pub async fn pay<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let payment = state.payments.prepare(parse_order_id(&id)?).await?;
    Ok(Json(PaymentResponse::from_payment(&payment)))
}

/// POST /orders/{id}/ship — mark a paid order as shipped.
#[tracing::instrument(skip(state))]
pub async fn ship<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let order = state.checkout.ship(parse_order_id(&id)?).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// POST /orders/{id}/deliver — mark a shipped order as delivered.
#[tracing::instrument(skip(state))]
pub async fn deliver<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let order = state.checkout.deliver(parse_order_id(&id)?).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

/// POST /orders/{id}/cancel — cancel an order, releasing its stock and
/// cancelling its payment at the gateway.
#[tracing::instrument(skip(state))]
pub async fn cancel<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let order = state.payments.cancel(parse_order_id(&id)?).await?;
    Ok(Json(OrderResponse::from_order(&order)))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

fn parse_account_id(id: &str) -> Result<AccountId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid account ID: {e}")))?;
    Ok(AccountId::from_uuid(uuid))
}
