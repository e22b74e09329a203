//! Line item post-processing.
//!
//! The improver classifies segmented items (regular, tax, discount),
//! backfills SKUs from description text, cleans noisy OCR descriptions
//! while preserving bandwidth specs, and aligns amount signs. It also
//! derives document-level totals used for cross-checks. The whole pass
//! is idempotent: improving an already-improved list is a no-op.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::extract::patterns::Patterns;
use crate::models::config::{ExtractionConfig, SkuCharset};
use crate::models::record::LineItem;

lazy_static! {
    static ref BANDWIDTH_SPEC: Regex =
        Regex::new(r"(?i)\d+\s*Gbps\s*Fiber|\d+\s*Gbps|\d+\s*Mbps").unwrap();
    static ref PARENTHETICAL: Regex = Regex::new(r"\([^)]*\)").unwrap();
    static ref ENDPOINT_REF: Regex = Regex::new(r"(?i)\bto\s+[A-Za-z0-9]{6,15}\b").unwrap();
    static ref DIGIT_CODE: Regex = Regex::new(r"\b\d+[A-Za-z0-9]{5,14}\b").unwrap();
    static ref MIXED_CODE: Regex = Regex::new(r"\b[A-Za-z]{2,}\d+[A-Za-z]{2,}\b").unwrap();
    static ref MULTI_SPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref DANGLING_COMMAS: Regex = Regex::new(r"\s*,(\s*,)*\s*").unwrap();
    static ref NUMERIC_SKU: Regex = Regex::new(r"\b(\d{6,15})\b").unwrap();
    static ref ALNUM_SKU: Regex = Regex::new(r"\b([A-Z0-9][A-Z0-9\-]{5,14})\b").unwrap();
    static ref LAST_AMOUNT: Regex = Regex::new(r"\$?\s*(\d{1,3}(?:,\d{3})*\.\d{2})").unwrap();
}

/// Description words marking a tax row.
const TAX_KEYWORDS: &[&str] = &["carrier taxes", "carrier tax", "sales tax", "tax"];

/// Description words marking a discount/credit row.
const DISCOUNT_KEYWORDS: &[&str] = &["discount", "credit", "refund", "deduction", "adjustment"];

/// Document-total labels scanned in OCR text, most specific first.
const TOTAL_LABELS: &[&str] = &[
    "grand total",
    "invoice total",
    "amount due",
    "balance due",
    "total",
];

/// Row classification driving the cleanup rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Regular,
    Tax,
    Discount,
}

/// Classify a line item from its description and total sign.
pub fn classify(item: &LineItem) -> ItemKind {
    let lower = item.description.to_lowercase();
    if TAX_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ItemKind::Tax;
    }
    if item.total < 0.0 || DISCOUNT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return ItemKind::Discount;
    }
    ItemKind::Regular
}

/// Post-processor for segmented line items.
#[derive(Debug, Clone)]
pub struct LineItemImprover {
    config: ExtractionConfig,
    patterns: Arc<Patterns>,
}

impl Default for LineItemImprover {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

impl LineItemImprover {
    pub fn new(config: ExtractionConfig) -> Self {
        Self::with_patterns(config, Patterns::shared())
    }

    pub fn with_patterns(config: ExtractionConfig, patterns: Arc<Patterns>) -> Self {
        Self { config, patterns }
    }

    /// Run the full improvement pass over a segmented item list.
    pub fn improve(&self, items: Vec<LineItem>) -> Vec<LineItem> {
        items
            .into_iter()
            .map(|mut item| {
                let kind = classify(&item);

                // Tax and discount rows never carry a product code, even
                // when the segmenter captured one.
                if kind != ItemKind::Regular {
                    item.sku.clear();
                } else if item.sku.is_empty() {
                    if let Some(sku) = self.sku_from_description(&item.description) {
                        debug!("backfilled sku {} from description", sku);
                        item.sku = sku;
                    }
                }

                item.description = clean_description(&item.description);

                if item.total < 0.0 && item.price > 0.0 {
                    item.price = -item.price;
                }
                item.tax_rate = 0.0;
                item
            })
            .collect()
    }

    /// Pull a product code out of the description, shaped per the
    /// configured SKU charset.
    ///
    /// Alphanumeric mode tries the labeled/parenthetical SKU patterns
    /// first, then falls back to a bare code shape. A code must carry
    /// at least one digit so capitalized words are never taken.
    fn sku_from_description(&self, description: &str) -> Option<String> {
        match self.config.sku_charset {
            SkuCharset::Numeric => NUMERIC_SKU
                .captures(description)
                .map(|caps| caps[1].to_string()),
            SkuCharset::Alphanumeric => self
                .patterns
                .sku_patterns
                .iter()
                .filter_map(|pattern| pattern.captures(description))
                .map(|caps| caps[1].to_string())
                .chain(
                    ALNUM_SKU
                        .captures_iter(description)
                        .map(|caps| caps[1].to_string()),
                )
                .find(|code| {
                    (3..=20).contains(&code.len()) && code.chars().any(|c| c.is_ascii_digit())
                }),
        }
    }
}

/// Strip OCR noise from a description while keeping bandwidth specs.
///
/// Parentheticals, circuit endpoint references, and embedded codes are
/// removed; any `N Gbps`/`N Mbps` specs they carried are re-appended.
/// An empty result reverts to the original text.
pub fn clean_description(original: &str) -> String {
    let mut specs: Vec<String> = Vec::new();
    for paren in PARENTHETICAL.find_iter(original) {
        for spec in BANDWIDTH_SPEC.find_iter(paren.as_str()) {
            specs.push(normalize_ws(spec.as_str()));
        }
    }

    let stripped = PARENTHETICAL.replace_all(original, " ");
    for spec in BANDWIDTH_SPEC.find_iter(&stripped) {
        specs.push(normalize_ws(spec.as_str()));
    }
    specs.dedup();

    let cleaned = ENDPOINT_REF.replace_all(&stripped, " ");
    let cleaned = DIGIT_CODE.replace_all(&cleaned, " ");
    let cleaned = MIXED_CODE.replace_all(&cleaned, " ");
    let cleaned = cleaned.replace('|', ", ");
    let cleaned = DANGLING_COMMAS.replace_all(&cleaned, ", ");
    let mut cleaned = normalize_ws(&cleaned)
        .trim_matches([',', ' '])
        .to_string();

    for spec in &specs {
        if !cleaned.to_lowercase().contains(&spec.to_lowercase()) {
            if !cleaned.is_empty() {
                cleaned.push_str(", ");
            }
            cleaned.push_str(spec);
        }
    }

    if cleaned.is_empty() {
        original.trim().to_string()
    } else {
        cleaned
    }
}

/// Document invoice total, by priority: structured `total` field, a
/// labeled total line in the OCR text, then the absolute sum of item
/// totals.
pub fn invoice_total(
    items: &[LineItem],
    ocr_text: Option<&str>,
    response: Option<&Value>,
) -> f64 {
    if let Some(total) = response.and_then(structured_total) {
        return total;
    }
    if let Some(total) = ocr_text.and_then(total_from_text) {
        return total;
    }
    items.iter().map(|i| i.total).sum::<f64>().abs()
}

fn structured_total(response: &Value) -> Option<f64> {
    let value = response.get("total")?;
    let value = value.get("value").unwrap_or(value);
    let total = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (total > 0.0).then_some(total)
}

/// Last amount on the first labeled total line that is not a subtotal.
fn total_from_text(text: &str) -> Option<f64> {
    for label in TOTAL_LABELS {
        for line in text.lines() {
            let lower = line.to_lowercase();
            if !lower.contains(label) || lower.contains("subtotal") {
                continue;
            }
            if let Some(amount) = LAST_AMOUNT
                .captures_iter(line)
                .last()
                .and_then(|caps| caps[1].replace(',', "").parse::<f64>().ok())
            {
                return Some(amount);
            }
        }
    }
    None
}

/// Effective tax rate implied by the tax rows against the rest of the
/// invoice, as a percentage rounded to two decimals.
pub fn tax_rate_from_items(items: &[LineItem], invoice_total: f64) -> Option<f64> {
    let tax: f64 = items
        .iter()
        .filter(|i| classify(i) == ItemKind::Tax)
        .map(|i| i.total)
        .sum();
    let tax = tax.abs();
    if tax == 0.0 {
        return None;
    }

    let subtotal = invoice_total - tax;
    if subtotal <= 0.0 {
        return None;
    }
    Some((tax / subtotal * 10_000.0).round() / 100.0)
}

/// Tax rate from structured `tax` and `subtotal` fields.
pub fn tax_rate_from_response(response: &Value) -> Option<f64> {
    let field = |key: &str| {
        let value = response.get(key)?;
        let value = value.get("value").unwrap_or(value);
        value.as_f64().or_else(|| value.as_str()?.trim().parse().ok())
    };
    let tax = field("tax")?;
    let subtotal = field("subtotal")?;
    if subtotal <= 0.0 {
        return None;
    }
    Some((tax / subtotal * 10_000.0).round() / 100.0)
}

fn normalize_ws(text: &str) -> String {
    MULTI_SPACE.replace_all(text.trim(), " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn item(description: &str, price: f64, total: f64) -> LineItem {
        LineItem {
            description: description.to_string(),
            price,
            total,
            ..LineItem::default()
        }
    }

    #[test]
    fn classification() {
        assert_eq!(classify(&item("Carrier Taxes", 12.0, 12.0)), ItemKind::Tax);
        assert_eq!(
            classify(&item("Item Discount", 50.0, -50.0)),
            ItemKind::Discount
        );
        assert_eq!(
            classify(&item("Plain service", 10.0, -10.0)),
            ItemKind::Discount
        );
        assert_eq!(
            classify(&item("Fiber Transport", 100.0, 100.0)),
            ItemKind::Regular
        );
    }

    #[test]
    fn numeric_sku_backfilled_for_regular_items_only() {
        let improver = LineItemImprover::default();
        let items = improver.improve(vec![
            item("Transport circuit 88412345 monthly", 100.0, 100.0),
            item("Carrier Taxes 88412345", 12.0, 12.0),
        ]);
        assert_eq!(items[0].sku, "88412345");
        assert_eq!(items[1].sku, "");
    }

    #[test]
    fn tax_and_discount_rows_lose_a_captured_sku() {
        let improver = LineItemImprover::default();
        let mut tax = item("Carrier Taxes (4411223)", 12.0, 12.0);
        tax.sku = "4411223".to_string();
        let mut credit = item("Service Credit", 25.0, -25.0);
        credit.sku = "88412345".to_string();

        let items = improver.improve(vec![tax, credit]);
        assert_eq!(items[0].sku, "");
        assert_eq!(items[1].sku, "");
    }

    #[test]
    fn alphanumeric_sku_requires_a_digit() {
        let improver = LineItemImprover::new(ExtractionConfig {
            sku_charset: SkuCharset::Alphanumeric,
            ..ExtractionConfig::default()
        });
        let items = improver.improve(vec![item("Circuit CKT-4431X monthly", 10.0, 10.0)]);
        assert_eq!(items[0].sku, "CKT-4431X");
    }

    #[test]
    fn description_keeps_bandwidth_spec_from_parenthetical() {
        assert_eq!(
            clean_description("Fiber Transport (10 Gbps) to DC44521A"),
            "Fiber Transport, 10 Gbps"
        );
    }

    #[test]
    fn description_cleaning_strips_codes_and_pipes() {
        assert_eq!(
            clean_description("Wave service 100Gbps | ab12cd circuit"),
            "Wave service, circuit, 100Gbps"
        );
        assert_eq!(clean_description("Managed  Service "), "Managed Service");
    }

    #[test]
    fn empty_cleanup_reverts_to_original() {
        assert_eq!(clean_description("(12345)"), "(12345)");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = clean_description("Fiber Transport (10 Gbps) to DC44521A");
        assert_eq!(clean_description(&once), once);
    }

    #[test]
    fn negative_total_flips_positive_price() {
        let improver = LineItemImprover::default();
        let items = improver.improve(vec![item("Credit", 25.0, -25.0)]);
        assert_eq!(items[0].price, -25.0);
    }

    #[test]
    fn invoice_total_prefers_structured_value() {
        let response = json!({"total": {"value": 1450.25}});
        let items = vec![item("a", 1.0, 1.0)];
        assert_eq!(
            invoice_total(&items, Some("Total: $99.00"), Some(&response)),
            1450.25
        );
    }

    #[test]
    fn invoice_total_from_labeled_line_skips_subtotal() {
        let text = "Subtotal: $1,000.00\nGrand Total: $1,085.00\n";
        assert_eq!(invoice_total(&[], Some(text), None), 1085.0);
    }

    #[test]
    fn invoice_total_falls_back_to_item_sum() {
        let items = vec![item("a", -10.0, -10.0), item("b", -5.0, -5.0)];
        assert_eq!(invoice_total(&items, None, None), 15.0);
    }

    #[test]
    fn tax_rate_from_tax_rows() {
        let items = vec![
            item("Fiber Transport", 1000.0, 1000.0),
            item("Carrier Taxes", 85.0, 85.0),
        ];
        assert_eq!(tax_rate_from_items(&items, 1085.0), Some(8.5));
    }

    #[test]
    fn tax_rate_from_structured_fields() {
        let response = json!({"tax": {"value": 85.0}, "subtotal": {"value": 1000.0}});
        assert_eq!(tax_rate_from_response(&response), Some(8.5));
    }

    #[test]
    fn emitted_tax_rate_stays_zero() {
        let improver = LineItemImprover::default();
        let mut source = item("Service", 10.0, 10.0);
        source.tax_rate = 8.5;
        let items = improver.improve(vec![source]);
        assert_eq!(items[0].tax_rate, 0.0);
    }
}
