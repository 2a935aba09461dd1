//! Shared types used across the orderflow workspace.
//!
//! Identifier newtypes prevent mixing up the various UUID-backed IDs, and
//! [`Money`] keeps all monetary arithmetic in fixed-point minor units.

mod ids;
mod money;

pub use ids::{AccountId, CartId, OrderId, PaymentId, ProductId};
pub use money::Money;
