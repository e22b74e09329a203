//! Invoice record models.
//!
//! The reconciled output is a flat six-field record. Every field is always
//! present: string fields default to `""` and `line_items` to an empty
//! vector, never a missing key or null.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tolerance for the `quantity * price ~ |total|` consistency check.
const AMOUNT_TOLERANCE: f64 = 0.05;

/// The reconciled invoice record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// Vendor (remittance) name.
    #[serde(default)]
    pub vendor_name: String,

    /// Vendor address, possibly multi-line (joined by newline).
    #[serde(default)]
    pub vendor_address: String,

    /// Billed customer name.
    #[serde(default)]
    pub bill_to_name: String,

    /// Invoice number/identifier.
    #[serde(default)]
    pub invoice_number: String,

    /// Invoice date in MM/DD/YYYY format, or empty.
    #[serde(default)]
    pub date: String,

    /// Line items on the invoice.
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

/// A single billable row on the invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product code, numeric-only in the default configuration. May be empty.
    #[serde(default)]
    pub sku: String,

    /// Product/service description, cleaned of internal codes.
    #[serde(default)]
    pub description: String,

    /// Quantity.
    #[serde(default)]
    pub quantity: f64,

    /// Unit price. Shares sign with `total`.
    #[serde(default)]
    pub price: f64,

    /// Tax rate percentage. 0.0 for tax and discount items.
    #[serde(default)]
    pub tax_rate: f64,

    /// Signed line total; negative for discounts and credits.
    #[serde(default)]
    pub total: f64,
}

impl LineItem {
    /// Check whether `quantity * price` agrees with `|total|`.
    ///
    /// Mismatches are logged as warnings, never treated as errors - OCR
    /// noise routinely breaks the arithmetic on otherwise useful rows.
    pub fn amounts_consistent(&self) -> bool {
        if self.quantity == 0.0 || self.price == 0.0 {
            return true;
        }
        let expected = self.quantity * self.price.abs();
        let consistent = (expected - self.total.abs()).abs() <= AMOUNT_TOLERANCE * expected.max(1.0);
        if !consistent {
            warn!(
                "line item amounts disagree: {} x {} != {} ({})",
                self.quantity, self.price, self.total, self.description
            );
        }
        consistent
    }

    /// Check whether `price` and `total` share a sign.
    pub fn signs_consistent(&self) -> bool {
        self.price * self.total >= 0.0
    }
}

impl InvoiceRecord {
    /// Create an empty record with all fields present and defaulted.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True if no field carries any extracted data.
    pub fn is_empty(&self) -> bool {
        self.vendor_name.is_empty()
            && self.vendor_address.is_empty()
            && self.bill_to_name.is_empty()
            && self.invoice_number.is_empty()
            && self.date.is_empty()
            && self.line_items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_record_serializes_all_six_fields() {
        let record = InvoiceRecord::empty();
        let json = serde_json::to_value(&record).unwrap();
        let obj = json.as_object().unwrap();

        for field in [
            "vendor_name",
            "vendor_address",
            "bill_to_name",
            "invoice_number",
            "date",
            "line_items",
        ] {
            assert!(obj.contains_key(field), "missing field: {}", field);
        }
        assert_eq!(obj["vendor_name"], serde_json::json!(""));
        assert_eq!(obj["line_items"], serde_json::json!([]));
    }

    #[test]
    fn line_item_serializes_numbers_not_strings() {
        let item = LineItem {
            sku: "12345".to_string(),
            description: "Transport".to_string(),
            quantity: 1.0,
            price: 2500.0,
            tax_rate: 0.0,
            total: 2500.0,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert!(json["price"].is_number());
        assert!(json["quantity"].is_number());
        assert!(json["total"].is_number());
    }

    #[test]
    fn amount_consistency_within_tolerance() {
        let item = LineItem {
            quantity: 2.0,
            price: 10.0,
            total: 20.0,
            ..Default::default()
        };
        assert!(item.amounts_consistent());

        let off = LineItem {
            quantity: 2.0,
            price: 10.0,
            total: 45.0,
            ..Default::default()
        };
        assert!(!off.amounts_consistent());
    }

    #[test]
    fn sign_consistency() {
        let discount = LineItem {
            price: -100.0,
            total: -100.0,
            ..Default::default()
        };
        assert!(discount.signs_consistent());

        let broken = LineItem {
            price: 100.0,
            total: -100.0,
            ..Default::default()
        };
        assert!(!broken.signs_consistent());
    }
}
