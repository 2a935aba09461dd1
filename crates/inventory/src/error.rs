use thiserror::Error;

use crate::ledger::Shortage;

/// Errors that can occur when interacting with the inventory ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// One or more lines would drive stock negative. Nothing was
    /// mutated; `shortages` names every offending line.
    #[error("Insufficient stock: {}", format_shortages(shortages))]
    InsufficientStock { shortages: Vec<Shortage> },

    /// The product is not known to the ledger.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn format_shortages(shortages: &[Shortage]) -> String {
    shortages
        .iter()
        .map(|s| {
            format!(
                "{} (requested {}, available {})",
                s.product_id, s.requested, s.available
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
