//! Extracted-record auditing.

use tracing::warn;

use super::Validate;
use crate::extract::dates;
use crate::models::record::InvoiceRecord;

/// Post-extraction audit of a finished record: identity fields present,
/// date in canonical form, and line item arithmetic coherent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        Self
    }
}

impl Validate<InvoiceRecord> for RecordValidator {
    fn problems(&self, record: &InvoiceRecord) -> Vec<String> {
        let mut problems = Vec::new();

        if record.vendor_name.is_empty() {
            problems.push("vendor name missing".to_string());
        }
        if record.invoice_number.is_empty() {
            problems.push("invoice number missing".to_string());
        }

        if record.date.is_empty() {
            problems.push("date missing".to_string());
        } else if dates::parse_date(&record.date).is_none() {
            problems.push(format!("date not parseable: {}", record.date));
        }

        if record.line_items.is_empty() {
            problems.push("no line items".to_string());
        }
        for (idx, item) in record.line_items.iter().enumerate() {
            if item.description.is_empty() && item.sku.is_empty() {
                problems.push(format!("line item {} has no description or sku", idx));
            }
            if !item.amounts_consistent() {
                problems.push(format!(
                    "line item {} amounts inconsistent: {} x {} != {}",
                    idx, item.quantity, item.price, item.total
                ));
            }
            if !item.signs_consistent() {
                problems.push(format!("line item {} price/total signs differ", idx));
            }
        }

        if !problems.is_empty() {
            warn!("record failed validation: {:?}", problems);
        }
        problems
    }
}
