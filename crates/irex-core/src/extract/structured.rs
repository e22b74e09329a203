//! Extraction from structured key/value response trees.
//!
//! Leaf values in the tree may be plain scalars or `{"value": scalar}`
//! wrappers; lookups unwrap the wrapper transparently. Every field miss
//! degrades to `None` so a partial response still yields a usable draft.

use serde_json::Value;
use tracing::debug;

use super::{company, dates, ExtractFields, FieldDraft, SourceData};
use crate::models::record::LineItem;

/// Field extractor over a structured response tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredExtractor;

impl StructuredExtractor {
    pub fn new() -> Self {
        Self
    }

    fn vendor_name(&self, response: &Value) -> Option<String> {
        const PATHS: &[&[&str]] = &[&["vendor", "name"], &["vendor", "raw_name"]];
        for path in PATHS {
            if let Some(raw) = lookup_str(response, path) {
                if let Some(name) = company::clean_vendor_name(&raw) {
                    return Some(name);
                }
            }
        }
        None
    }

    fn vendor_address(&self, response: &Value) -> Option<String> {
        const PATHS: &[&[&str]] = &[&["vendor", "address"], &["vendor", "raw_address"]];
        for path in PATHS {
            if let Some(raw) = lookup_str(response, path) {
                let flat = raw
                    .lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ");
                if !flat.is_empty() {
                    return Some(flat);
                }
            }
        }
        None
    }

    fn bill_to_name(&self, response: &Value) -> Option<String> {
        lookup_str(response, &["bill_to", "name"])
            .and_then(|raw| company::clean_company_name(&raw))
    }

    fn invoice_number(&self, response: &Value) -> Option<String> {
        let value = lookup(response, &["invoice_number"])?;
        let text = match unwrap_value(value) {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn date(&self, response: &Value) -> Option<String> {
        let raw = lookup_str(response, &["date"])?;
        if let Some(reformatted) = dates::reformat_iso_substring(&raw) {
            return Some(reformatted);
        }
        dates::parse_date(&raw).map(dates::format_mdy)
    }

    /// Map the response's `line_items` array into records. Items with
    /// neither a description nor a SKU are dropped.
    pub fn extract_line_items(&self, response: &Value) -> Vec<LineItem> {
        let Some(items) = response.get("line_items").and_then(Value::as_array) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        for entry in items {
            let sku = field_str(entry, "sku")
                .or_else(|| field_str(entry, "upc"))
                .unwrap_or_default();
            let description = field_str(entry, "description")
                .or_else(|| field_str(entry, "full_description"))
                .unwrap_or_default();

            if description.is_empty() && sku.is_empty() {
                continue;
            }

            out.push(LineItem {
                sku,
                description,
                quantity: field_f64(entry, "quantity"),
                price: field_f64(entry, "price"),
                tax_rate: 0.0,
                total: field_f64(entry, "total"),
            });
        }
        debug!("structured response yielded {} line items", out.len());
        out
    }
}

impl ExtractFields for StructuredExtractor {
    fn extract_all_fields(&self, source: &SourceData) -> FieldDraft {
        let Some(response) = source.response.as_ref() else {
            return FieldDraft::default();
        };
        FieldDraft {
            vendor_name: self.vendor_name(response),
            vendor_address: self.vendor_address(response),
            bill_to_name: self.bill_to_name(response),
            invoice_number: self.invoice_number(response),
            date: self.date(response),
            line_items: self.extract_line_items(response),
        }
    }
}

/// Walk a key path through nested objects, descending through
/// `{"value": ...}` wrappers along the way.
fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = root;
    for key in path {
        current = unwrap_value(current).get(key)?;
    }
    Some(current)
}

fn lookup_str(root: &Value, path: &[&str]) -> Option<String> {
    let text = unwrap_value(lookup(root, path)?).as_str()?.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Unwrap a `{"value": scalar}` leaf wrapper, or return the value as is.
fn unwrap_value(value: &Value) -> &Value {
    match value.get("value") {
        Some(inner) => inner,
        None => value,
    }
}

fn field_str(entry: &Value, key: &str) -> Option<String> {
    let text = unwrap_value(entry.get(key)?);
    match text {
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                Some(s.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Coerce a numeric field to f64; anything unparseable becomes 0.0.
fn field_f64(entry: &Value, key: &str) -> f64 {
    let Some(value) = entry.get(key) else {
        return 0.0;
    };
    match unwrap_value(value) {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
