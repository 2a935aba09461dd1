//! Shipping address value object.

use serde::{Deserialize, Serialize};

/// Destination snapshot stored with each order.
///
/// Copied into the order at creation time so later address-book edits
/// never change where an existing order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    /// Name of the person receiving the parcel.
    pub recipient: String,
    /// Contact phone number.
    pub phone: String,
    /// Street address.
    pub line1: String,
    /// Apartment, suite, etc.
    pub line2: Option<String>,
    /// City.
    pub city: String,
    /// Postal code.
    pub postal_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization_roundtrip() {
        let address = ShippingAddress {
            recipient: "Jane Doe".to_string(),
            phone: "010-1234-5678".to_string(),
            line1: "1 Main St".to_string(),
            line2: Some("Apt 42".to_string()),
            city: "Seoul".to_string(),
            postal_code: "04524".to_string(),
        };

        let json = serde_json::to_string(&address).unwrap();
        let deserialized: ShippingAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(address, deserialized);
    }
}
