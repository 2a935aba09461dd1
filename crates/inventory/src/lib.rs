//! Inventory ledger for the orderflow system.
//!
//! Stock is modelled as an explicit ledger with atomic conditional
//! decrements rather than read-then-write on a shared counter, so
//! concurrent checkouts against the last unit cannot oversell: exactly
//! one reservation succeeds and the other fails with
//! [`LedgerError::InsufficientStock`].
//!
//! Two implementations are provided: [`InMemoryLedger`] for tests and
//! local development, and [`PostgresLedger`] backed by row-conditional
//! `UPDATE` statements inside a single transaction.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;

pub use error::{LedgerError, Result};
pub use ledger::{InventoryLedger, ProductRecord, Shortage, StockLine};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
