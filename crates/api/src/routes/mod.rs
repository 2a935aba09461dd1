//! Route handlers.

pub mod carts;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;
