//! Payment records and their lifecycle state machine.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Completed, failed, and cancelled payments are frozen.
    #[error("Invalid payment transition: {from} -> {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
}

/// Payment lifecycle: `pending -> completed | failed | cancelled`.
///
/// Everything but `pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting confirmation from the gateway.
    #[default]
    Pending,
    /// Amount verified and captured.
    Completed,
    /// Rejected by the gateway or amount mismatch.
    Failed,
    /// Cancelled/refunded at the gateway.
    Cancelled,
}

impl PaymentStatus {
    /// Returns true if the transition `self -> next` is allowed.
    pub fn can_transition(self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Failed) | (Pending, Cancelled)
        )
    }

    /// Returns true if this is a terminal status.
    pub fn is_terminal(self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// A payment attempt against one order.
///
/// The provider transaction ID doubles as the idempotency key for
/// webhook notifications: repeated notifications for the same
/// transaction must not change state twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    order_id: OrderId,
    provider: String,
    transaction_id: Option<String>,
    amount: Money,
    status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new pending payment for an order.
    ///
    /// The amount is the order's final amount; confirmation later
    /// verifies the gateway-reported amount against it.
    pub fn new(order_id: OrderId, provider: impl Into<String>, amount: Money) -> Self {
        let now = Utc::now();
        Self {
            id: PaymentId::new(),
            order_id,
            provider: provider.into(),
            transaction_id: None,
            amount,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstructs a payment from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: PaymentId,
        order_id: OrderId,
        provider: String,
        transaction_id: Option<String>,
        amount: Money,
        status: PaymentStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            provider,
            transaction_id,
            amount,
            status,
            created_at,
            updated_at,
        }
    }

    /// Returns the payment ID.
    pub fn id(&self) -> PaymentId {
        self.id
    }

    /// Returns the order this payment belongs to.
    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// Returns the provider name.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Returns the provider-side transaction ID, if a session was opened.
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    /// Returns the expected amount.
    pub fn amount(&self) -> Money {
        self.amount
    }

    /// Returns the current status.
    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    /// Returns when the payment was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the payment was last updated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Records the provider session reference obtained at prepare time.
    pub fn attach_transaction(&mut self, transaction_id: impl Into<String>) {
        self.transaction_id = Some(transaction_id.into());
        self.updated_at = Utc::now();
    }

    /// Returns true if the gateway-reported amount equals the expected
    /// order amount.
    pub fn matches_amount(&self, reported: Money) -> bool {
        self.amount == reported
    }

    /// Transitions to `completed`.
    pub fn complete(&mut self) -> Result<(), PaymentError> {
        self.transition(PaymentStatus::Completed)
    }

    /// Transitions to `failed`.
    pub fn fail(&mut self) -> Result<(), PaymentError> {
        self.transition(PaymentStatus::Failed)
    }

    /// Transitions to `cancelled`.
    pub fn cancel(&mut self) -> Result<(), PaymentError> {
        self.transition(PaymentStatus::Cancelled)
    }

    fn transition(&mut self, next: PaymentStatus) -> Result<(), PaymentError> {
        if !self.status.can_transition(next) {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}
