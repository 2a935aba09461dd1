//! Domain layer for the orderflow system.
//!
//! This crate provides the pure domain model:
//! - Cart and CartItem with owner-scoped aggregation and guest-cart merging
//! - Order with frozen price/name snapshots and a status state machine
//! - Payment with its own lifecycle state machine
//! - Shipping address value object
//!
//! Nothing here talks to a database or the network; persistence and
//! coordination live in the `store`, `inventory`, and `checkout` crates.

pub mod cart;
pub mod order;
pub mod payment;
pub mod shipping;

pub use cart::{Cart, CartError, CartItem, CartOwner};
pub use order::{Order, OrderError, OrderItem, OrderNumber, OrderStatus};
pub use payment::{Payment, PaymentError, PaymentStatus};
pub use shipping::ShippingAddress;
