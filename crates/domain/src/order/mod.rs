//! Orders: immutable-once-created purchase records with a status
//! state machine.

mod number;
mod record;
mod status;

pub use number::OrderNumber;
pub use record::{Order, OrderItem};
pub use status::OrderStatus;

use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The requested status change is not in the allowed transition table.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    /// An order cannot be built without lines.
    #[error("Order has no items")]
    NoItems,

    /// Line quantity must be greater than zero.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// Snapshotted unit price must not be negative.
    #[error("Invalid unit price: {price}")]
    InvalidPrice { price: i64 },
}
