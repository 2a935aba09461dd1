//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use checkout::PaymentGateway;
use common::ProductId;
use domain::{Cart, CartOwner};
use inventory::InventoryLedger;
use serde::{Deserialize, Serialize};
use store::{CartRepository, OrderRepository, PaymentRepository};

use crate::AppState;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CartItemRequest {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct MergeRequest {
    /// Owner string of the cart to merge in, e.g. `session:tok-abc`.
    pub from: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartItemResponse {
    pub product_id: String,
    pub quantity: u32,
    /// Soft stock check: false when the line's quantity exceeds what
    /// the catalog currently has, or the product is gone. Advisory
    /// only; the authoritative check happens at checkout.
    pub in_stock: bool,
}

#[derive(Serialize)]
pub struct CartResponse {
    pub id: String,
    pub owner: String,
    pub items: Vec<CartItemResponse>,
    pub total_quantity: u32,
}

async fn cart_response<L: InventoryLedger>(
    cart: &Cart,
    ledger: &L,
) -> Result<CartResponse, ApiError> {
    let mut items = Vec::with_capacity(cart.items().len());
    for line in cart.items() {
        let in_stock = ledger
            .product(&line.product_id)
            .await?
            .map(|p| p.active && p.stock >= line.quantity)
            .unwrap_or(false);
        items.push(CartItemResponse {
            product_id: line.product_id.to_string(),
            quantity: line.quantity,
            in_stock,
        });
    }

    Ok(CartResponse {
        id: cart.id().to_string(),
        owner: cart.owner().to_string(),
        items,
        total_quantity: cart.total_quantity(),
    })
}

// -- Handlers --

/// GET /carts/{owner} — the owner's cart, created empty on first read.
#[tracing::instrument(skip(state))]
pub async fn get<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path(owner): Path<String>,
) -> Result<Json<CartResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let owner = parse_owner(&owner)?;
    let cart = state.store.get_or_create(&owner).await?;
    Ok(Json(cart_response(&cart, state.ledger.as_ref()).await?))
}

/// POST /carts/{owner}/items — add a line (or increment an existing one).
#[tracing::instrument(skip(state, req))]
pub async fn add_item<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path(owner): Path<String>,
    Json(req): Json<CartItemRequest>,
) -> Result<Json<CartResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let owner = parse_owner(&owner)?;
    let mut cart = state.store.get_or_create(&owner).await?;
    cart.add_item(ProductId::new(req.product_id), req.quantity)?;
    state.store.save(&cart).await?;
    Ok(Json(cart_response(&cart, state.ledger.as_ref()).await?))
}

/// PATCH /carts/{owner}/items — set a line's quantity (0 removes it).
#[tracing::instrument(skip(state, req))]
pub async fn update_item<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path(owner): Path<String>,
    Json(req): Json<CartItemRequest>,
) -> Result<Json<CartResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let owner = parse_owner(&owner)?;
    let mut cart = find_cart(state.store.as_ref(), &owner).await?;
    cart.update_quantity(&ProductId::new(req.product_id), req.quantity)?;
    state.store.save(&cart).await?;
    Ok(Json(cart_response(&cart, state.ledger.as_ref()).await?))
}

/// DELETE /carts/{owner}/items/{product} — remove a line.
#[tracing::instrument(skip(state))]
pub async fn remove_item<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path((owner, product)): Path<(String, String)>,
) -> Result<Json<CartResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let owner = parse_owner(&owner)?;
    let mut cart = find_cart(state.store.as_ref(), &owner).await?;
    cart.remove_item(&ProductId::new(product))?;
    state.store.save(&cart).await?;
    Ok(Json(cart_response(&cart, state.ledger.as_ref()).await?))
}

/// POST /carts/{owner}/merge — merge another cart (typically a guest
/// session cart, on login) into this one and destroy the source.
#[tracing::instrument(skip(state, req))]
pub async fn merge<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Path(owner): Path<String>,
    Json(req): Json<MergeRequest>,
) -> Result<Json<CartResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let owner = parse_owner(&owner)?;
    let source_owner = parse_owner(&req.from)?;

    let source = find_cart(state.store.as_ref(), &source_owner).await?;
    let mut target = state.store.get_or_create(&owner).await?;
    target.merge(&source)?;

    state.store.save(&target).await?;
    state.store.delete(&source_owner).await?;

    Ok(Json(cart_response(&target, state.ledger.as_ref()).await?))
}

async fn find_cart<R: CartRepository>(store: &R, owner: &CartOwner) -> Result<Cart, ApiError> {
    store
        .find(owner)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("cart not found: {owner}")))
}

fn parse_owner(raw: &str) -> Result<CartOwner, ApiError> {
    raw.parse()
        .map_err(|e: String| ApiError::BadRequest(format!("Invalid owner: {e}")))
}
