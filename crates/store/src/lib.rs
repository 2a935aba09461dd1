//! Persistence layer for carts, orders, and payments.
//!
//! Repositories are traits so the coordination layer can run against
//! the in-memory backend in tests and PostgreSQL in production. The
//! in-memory backend mirrors the SQL backend's semantics, including
//! the one-active-cart-per-owner rule.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use repository::{CartRepository, OrderRepository, PaymentRepository};
