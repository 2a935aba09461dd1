//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{Money, OrderId};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors reported by a payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Transient failure (network, provider outage). Safe to retry.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// The provider rejected the request. Retrying will not help.
    #[error("gateway rejected: {0}")]
    Rejected(String),
}

/// A provider session opened by `prepare`.
#[derive(Debug, Clone)]
pub struct GatewaySession {
    /// Provider-assigned transaction reference.
    pub transaction_id: String,
}

/// Provider-side view of a transaction, as reported by `lookup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayOutcome {
    /// The provider has not settled the transaction yet.
    Pending,
    /// The provider captured this amount.
    Completed(Money),
    /// The provider declined the transaction.
    Failed,
    /// The transaction was cancelled at the provider.
    Cancelled,
}

/// Trait for payment provider operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a provider session for the given amount.
    async fn prepare(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<GatewaySession, GatewayError>;

    /// Cancels (or refunds) a transaction at the provider.
    async fn cancel(&self, transaction_id: &str) -> Result<(), GatewayError>;

    /// Returns the provider's current view of a transaction.
    async fn lookup(&self, transaction_id: &str) -> Result<GatewayOutcome, GatewayError>;
}

/// Retry budget for gateway calls.
///
/// Each attempt runs under `call_timeout`; transient failures back off
/// exponentially from `base_delay`. Exhausting the budget surfaces as
/// unavailable and leaves the payment pending.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt after that.
    pub base_delay: Duration,
    /// Per-attempt deadline.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            call_timeout: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Returns the backoff delay before the given (1-based) attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(2))
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    sessions: HashMap<String, (OrderId, Money, GatewayOutcome)>,
    next_id: u32,
    unavailable_prepares: u32,
    reject_prepare: bool,
}

/// In-memory payment gateway for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` prepare calls fail as transient outages.
    pub async fn set_unavailable_prepares(&self, count: u32) {
        self.state.write().await.unavailable_prepares = count;
    }

    /// Makes prepare calls fail as terminal rejections.
    pub async fn set_reject_prepare(&self, reject: bool) {
        self.state.write().await.reject_prepare = reject;
    }

    /// Records a provider-side settlement, as a real provider would
    /// before sending a webhook.
    pub async fn settle(&self, transaction_id: &str, outcome: GatewayOutcome) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.sessions.get_mut(transaction_id) {
            entry.2 = outcome;
        }
    }

    /// Returns the number of open sessions.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn prepare(
        &self,
        order_id: OrderId,
        amount: Money,
    ) -> Result<GatewaySession, GatewayError> {
        let mut state = self.state.write().await;

        if state.unavailable_prepares > 0 {
            state.unavailable_prepares -= 1;
            return Err(GatewayError::Unavailable("provider timeout".to_string()));
        }
        if state.reject_prepare {
            return Err(GatewayError::Rejected("merchant blocked".to_string()));
        }

        state.next_id += 1;
        let transaction_id = format!("TXN-{:04}", state.next_id);
        state
            .sessions
            .insert(transaction_id.clone(), (order_id, amount, GatewayOutcome::Pending));

        Ok(GatewaySession { transaction_id })
    }

    async fn cancel(&self, transaction_id: &str) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        match state.sessions.get_mut(transaction_id) {
            Some(entry) => {
                entry.2 = GatewayOutcome::Cancelled;
                Ok(())
            }
            None => Err(GatewayError::Rejected(format!(
                "unknown transaction: {transaction_id}"
            ))),
        }
    }

    async fn lookup(&self, transaction_id: &str) -> Result<GatewayOutcome, GatewayError> {
        let state = self.state.read().await;
        match state.sessions.get(transaction_id) {
            Some((_, _, outcome)) => Ok(*outcome),
            None => Err(GatewayError::Rejected(format!(
                "unknown transaction: {transaction_id}"
            ))),
        }
    }
}
