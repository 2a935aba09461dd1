//! Payment webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use checkout::{PaymentGateway, WebhookNotification};
use inventory::InventoryLedger;
use store::{CartRepository, OrderRepository, PaymentRepository};

use crate::AppState;
use crate::error::ApiError;
use crate::routes::orders::PaymentResponse;

/// POST /payments/webhook — apply a gateway notification.
///
/// Keyed by transaction ID; duplicate or reordered notifications for a
/// settled transaction return the stored payment unchanged.
#[tracing::instrument(skip(state, notification))]
pub async fn webhook<S, L, G>(
    State(state): State<Arc<AppState<S, L, G>>>,
    Json(notification): Json<WebhookNotification>,
) -> Result<Json<PaymentResponse>, ApiError>
where
    S: CartRepository + OrderRepository + PaymentRepository + 'static,
    L: InventoryLedger + 'static,
    G: PaymentGateway + 'static,
{
    let payment = state.payments.confirm(notification).await?;
    Ok(Json(PaymentResponse::from_payment(&payment)))
}
