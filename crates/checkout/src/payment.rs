//! Payment coordination: gateway sessions, webhook confirmation,
//! cancellation, and reconciliation of stuck payments.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use domain::{Order, OrderStatus, Payment, PaymentStatus};
use inventory::{InventoryLedger, StockLine};
use serde::{Deserialize, Serialize};
use store::{OrderRepository, PaymentRepository};

use crate::error::{CheckoutError, Result};
use crate::gateway::{GatewayError, GatewayOutcome, PaymentGateway, RetryPolicy};

/// Outcome reported by the provider in a webhook notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// The provider captured the payment.
    Completed,
    /// The provider declined the payment.
    Failed,
    /// The payment was cancelled at the provider.
    Cancelled,
}

/// A provider webhook notification.
///
/// The transaction ID is the idempotency key: notifications for a
/// transaction that already reached a terminal state are no-ops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookNotification {
    /// Provider transaction reference from the prepare step.
    pub transaction_id: String,
    /// Provider-reported outcome.
    pub status: NotificationStatus,
    /// Provider-reported amount, verified against the order total.
    pub amount: Money,
}

/// Drives payments through their lifecycle against the gateway.
///
/// Stock is reserved at order creation, never across gateway calls, so
/// a slow or unreachable provider can only ever leave a payment
/// `pending`, to be resolved later by webhook or reconciliation.
pub struct PaymentCoordinator<S, L, G>
where
    S: OrderRepository + PaymentRepository,
    L: InventoryLedger,
    G: PaymentGateway,
{
    store: Arc<S>,
    ledger: Arc<L>,
    gateway: Arc<G>,
    provider: String,
    retry: RetryPolicy,
    pending_age: chrono::Duration,
}

impl<S, L, G> PaymentCoordinator<S, L, G>
where
    S: OrderRepository + PaymentRepository,
    L: InventoryLedger,
    G: PaymentGateway,
{
    /// Creates a new payment coordinator with the default retry policy
    /// and a 30 minute reconciliation age.
    pub fn new(store: Arc<S>, ledger: Arc<L>, gateway: Arc<G>, provider: impl Into<String>) -> Self {
        Self {
            store,
            ledger,
            gateway,
            provider: provider.into(),
            retry: RetryPolicy::default(),
            pending_age: chrono::Duration::minutes(30),
        }
    }

    /// Overrides the gateway retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides how long a payment may stay pending before
    /// reconciliation picks it up.
    pub fn with_pending_age(mut self, age: chrono::Duration) -> Self {
        self.pending_age = age;
        self
    }

    /// Opens a provider session for a pending order.
    ///
    /// The payment row is inserted before the gateway call, so a
    /// gateway outage leaves a pending payment behind rather than no
    /// record at all. Re-preparing an order whose payment is still
    /// pending returns the existing payment.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn prepare(&self, order_id: OrderId) -> Result<Payment> {
        let order = self.order(order_id).await?;

        if let Some(existing) = self.store.find_by_order(order_id).await? {
            if existing.status() == PaymentStatus::Pending && existing.transaction_id().is_some() {
                return Ok(existing);
            }
            if existing.status() == PaymentStatus::Completed {
                return Ok(existing);
            }
        }

        // Only a pending order may open a new session; anything else
        // would capture money against an order that can never be paid.
        if order.status() != OrderStatus::Pending {
            return Err(domain::OrderError::InvalidStatusTransition {
                from: order.status(),
                to: OrderStatus::Paid,
            }
            .into());
        }

        let mut payment = Payment::new(order.id(), self.provider.clone(), order.total());
        PaymentRepository::insert(self.store.as_ref(), &payment).await?;
        metrics::counter!("payments_prepared_total").increment(1);

        let session = match self
            .call_gateway(|| self.gateway.prepare(order.id(), order.total()))
            .await
        {
            Ok(session) => session,
            Err(CheckoutError::GatewayRejected(reason)) => {
                payment.fail()?;
                self.store.update(&payment).await?;
                metrics::counter!("payments_rejected_total").increment(1);
                return Err(CheckoutError::GatewayRejected(reason));
            }
            // Transient exhaustion: the payment stays pending for the
            // webhook or the reconciliation poller.
            Err(err) => return Err(err),
        };

        payment.attach_transaction(session.transaction_id);
        self.store.update(&payment).await?;
        tracing::info!(
            payment_id = %payment.id(),
            transaction_id = ?payment.transaction_id(),
            "provider session opened"
        );
        Ok(payment)
    }

    /// Applies a provider notification, keyed by transaction ID.
    ///
    /// A completed notification verifies the reported amount against
    /// the order total: on match the payment completes and the order
    /// becomes paid; on mismatch the payment fails and the order stays
    /// pending. Notifications for a transaction already in a terminal
    /// state return the stored payment unchanged.
    #[tracing::instrument(skip(self), fields(transaction_id = %notification.transaction_id))]
    pub async fn confirm(&self, notification: WebhookNotification) -> Result<Payment> {
        let mut payment = self
            .store
            .find_by_transaction(&notification.transaction_id)
            .await?
            .ok_or_else(|| {
                CheckoutError::UnknownTransaction(notification.transaction_id.clone())
            })?;

        if payment.status().is_terminal() {
            tracing::debug!(payment_id = %payment.id(), "duplicate notification ignored");
            return Ok(payment);
        }

        match notification.status {
            NotificationStatus::Completed => {
                if !payment.matches_amount(notification.amount) {
                    payment.fail()?;
                    self.store.update(&payment).await?;
                    metrics::counter!("payments_amount_mismatch_total").increment(1);
                    return Err(CheckoutError::AmountMismatch {
                        expected: payment.amount(),
                        reported: notification.amount,
                    });
                }

                payment.complete()?;
                self.store.update(&payment).await?;

                let mut order = self.order(payment.order_id()).await?;
                order.mark_paid()?;
                self.store.update_status(&order).await?;

                metrics::counter!("payments_completed_total").increment(1);
                tracing::info!(
                    payment_id = %payment.id(),
                    order_id = %order.id(),
                    "payment completed, order paid"
                );
            }
            NotificationStatus::Failed => {
                payment.fail()?;
                self.store.update(&payment).await?;
                metrics::counter!("payments_failed_total").increment(1);
            }
            NotificationStatus::Cancelled => {
                payment.cancel()?;
                self.store.update(&payment).await?;
                self.cancel_order_record(payment.order_id()).await?;
                metrics::counter!("payments_cancelled_total").increment(1);
            }
        }

        Ok(payment)
    }

    /// Cancels an order, its payment, and its stock reservation.
    ///
    /// If a provider session exists it is cancelled at the gateway
    /// first; an unreachable gateway aborts the cancellation so it can
    /// be retried. A completed payment keeps its status as the record
    /// of the capture; the provider-side cancel acts as the refund.
    #[tracing::instrument(skip(self), fields(order_id = %order_id))]
    pub async fn cancel(&self, order_id: OrderId) -> Result<Order> {
        // Fail fast on impossible transitions before touching the
        // gateway.
        let order = self.order(order_id).await?;
        if !order
            .status()
            .can_transition(domain::OrderStatus::Cancelled)
        {
            return Err(domain::OrderError::InvalidStatusTransition {
                from: order.status(),
                to: domain::OrderStatus::Cancelled,
            }
            .into());
        }

        if let Some(mut payment) = self.store.find_by_order(order_id).await? {
            if let Some(transaction_id) = payment.transaction_id().map(String::from) {
                self.call_gateway(|| self.gateway.cancel(&transaction_id))
                    .await?;
            }
            if payment.status() == PaymentStatus::Pending {
                payment.cancel()?;
                self.store.update(&payment).await?;
            }
        }

        let order = self.cancel_order_record(order_id).await?;
        metrics::counter!("orders_cancelled_total").increment(1);
        Ok(order)
    }

    /// Resolves payments stuck in `pending` longer than the configured
    /// age by asking the provider what happened, applying the outcome
    /// through the same idempotent paths as webhooks. Returns the
    /// number of payments resolved.
    #[tracing::instrument(skip(self))]
    pub async fn reconcile(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = now - self.pending_age;
        let stuck = self.store.list_pending_created_before(cutoff).await?;

        let mut resolved = 0;
        for payment in stuck {
            match self.reconcile_one(&payment).await {
                Ok(true) => resolved += 1,
                Ok(false) => {}
                // One unresolvable payment must not starve the rest of
                // the pass.
                Err(err) => {
                    tracing::error!(payment_id = %payment.id(), error = %err, "reconciliation failed");
                }
            }
        }

        if resolved > 0 {
            metrics::counter!("payments_reconciled_total").increment(resolved as u64);
            tracing::info!(resolved, "reconciliation pass settled stuck payments");
        }
        Ok(resolved)
    }

    /// Settles one stuck payment. Returns true if it was resolved.
    async fn reconcile_one(&self, payment: &Payment) -> Result<bool> {
        let Some(transaction_id) = payment.transaction_id().map(String::from) else {
            // No provider session was ever opened, so nothing can ever
            // complete this payment row. The order is cancelled only
            // when this is still its latest attempt and it has not been
            // paid through a newer one.
            let mut stale = payment.clone();
            stale.cancel()?;
            self.store.update(&stale).await?;

            let latest = self.store.find_by_order(stale.order_id()).await?;
            let is_latest = latest.map(|p| p.id() == stale.id()).unwrap_or(true);
            if is_latest {
                let order = self.order(stale.order_id()).await?;
                if order.status() == OrderStatus::Pending {
                    self.cancel_order_record(stale.order_id()).await?;
                }
            }
            return Ok(true);
        };

        let outcome = match self.gateway.lookup(&transaction_id).await {
            Ok(outcome) => outcome,
            Err(GatewayError::Unavailable(reason)) => {
                tracing::warn!(%transaction_id, %reason, "reconciliation lookup failed, will retry");
                return Ok(false);
            }
            Err(GatewayError::Rejected(reason)) => {
                tracing::error!(%transaction_id, %reason, "provider does not know this transaction");
                return Ok(false);
            }
        };

        let notification = match outcome {
            GatewayOutcome::Pending => return Ok(false),
            GatewayOutcome::Completed(amount) => WebhookNotification {
                transaction_id,
                status: NotificationStatus::Completed,
                amount,
            },
            GatewayOutcome::Failed => WebhookNotification {
                transaction_id,
                status: NotificationStatus::Failed,
                amount: payment.amount(),
            },
            GatewayOutcome::Cancelled => WebhookNotification {
                transaction_id,
                status: NotificationStatus::Cancelled,
                amount: payment.amount(),
            },
        };

        match self.confirm(notification).await {
            // An amount mismatch still settles the payment record.
            Ok(_) | Err(CheckoutError::AmountMismatch { .. }) => Ok(true),
            Err(err) => Err(err),
        }
    }

    /// Runs reconciliation on a fixed interval until the task is
    /// aborted. Spawned by the server at startup.
    pub async fn reconcile_forever(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = self.reconcile(Utc::now()).await {
                tracing::error!(error = %err, "reconciliation pass failed");
            }
        }
    }

    async fn order(&self, order_id: OrderId) -> Result<Order> {
        OrderRepository::find(self.store.as_ref(), order_id)
            .await?
            .ok_or(CheckoutError::OrderNotFound(order_id))
    }

    /// Transitions the order to cancelled, releasing its stock when the
    /// state machine says the cancellation frees a reservation.
    async fn cancel_order_record(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self.order(order_id).await?;
        let release = order.cancel()?;
        self.store.update_status(&order).await?;

        if release {
            let lines: Vec<StockLine> = order
                .items()
                .iter()
                .map(|item| StockLine::new(item.product_id.clone(), item.quantity))
                .collect();
            self.ledger.release(&lines).await?;
        }

        tracing::info!(order_id = %order.id(), released = release, "order cancelled");
        Ok(order)
    }

    async fn call_gateway<T, F, Fut>(&self, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, GatewayError>>,
    {
        let mut last_reason = String::new();
        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.retry.delay_before(attempt)).await;
            }

            match tokio::time::timeout(self.retry.call_timeout, call()).await {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(GatewayError::Rejected(reason))) => {
                    return Err(CheckoutError::GatewayRejected(reason));
                }
                Ok(Err(GatewayError::Unavailable(reason))) => {
                    tracing::warn!(attempt, %reason, "gateway call failed, retrying");
                    last_reason = reason;
                }
                Err(_) => {
                    tracing::warn!(attempt, "gateway call timed out, retrying");
                    last_reason = format!("timed out after {:?}", self.retry.call_timeout);
                }
            }
        }

        metrics::counter!("gateway_retry_exhausted_total").increment(1);
        Err(CheckoutError::GatewayUnavailable(last_reason))
    }
}
