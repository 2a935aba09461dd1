//! Human-facing order numbers.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique, immutable order number shown to customers.
///
/// Format: `ORD-YYYYMMDD-xxxxxxxx` where the suffix is the first eight
/// hex digits of a random UUID. The database enforces uniqueness; the
/// random suffix makes collisions within a day practically impossible.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Generates a new order number for today's date.
    pub fn generate() -> Self {
        let date = Utc::now().format("%Y%m%d");
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("ORD-{date}-{}", &suffix[..8]))
    }

    /// Wraps an existing order number read back from storage.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the order number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
