//! Compiled regex patterns for invoice field extraction.
//!
//! Pure configuration: the registry holds precompiled matchers and word
//! lists, no extraction logic. Patterns compile once; the default
//! instance is shared process-wide and extractors accept an alternative
//! registry at construction for testing.

use std::collections::HashSet;
use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref DEFAULT_PATTERNS: Arc<Patterns> = Arc::new(Patterns::new());
}

/// Immutable registry of compiled extraction patterns.
#[derive(Debug)]
pub struct Patterns {
    /// Date token shapes: slash/dash numeric, ISO-ordered, "Month DD, YYYY".
    pub date_patterns: Vec<Regex>,

    /// Invoice number patterns ordered by reliability: labeled numeric,
    /// labeled alphanumeric, standalone numeric, bare alphanumeric with `#`.
    pub invoice_number_patterns: Vec<Regex>,

    /// Labeled invoice number patterns only (header-area strategy).
    pub invoice_number_labeled: Vec<Regex>,

    /// Standalone 6-20 digit token.
    pub standalone_number: Regex,

    /// Words that must never be accepted as invoice numbers.
    pub invoice_number_exclusions: HashSet<&'static str>,

    /// Price token: optional sign, optional `$`, thousands separators,
    /// optional two-decimal fraction.
    pub price: Regex,

    /// Negative price token (discounts/credits).
    pub negative_price: Regex,

    /// Tax rate percentage.
    pub tax_rate: Regex,

    /// SKU patterns: labeled, line-start code, parenthetical code.
    pub sku_patterns: Vec<Regex>,

    /// Vendor label patterns (`from:`/`vendor:`/`supplier:`, corporate-suffix name).
    pub vendor_patterns: Vec<Regex>,

    /// Remittance statement patterns ("please make payments to: ...").
    pub payment_patterns: Vec<Regex>,

    /// Bill-to label patterns.
    pub bill_to_patterns: Vec<Regex>,

    /// Street address with a street-type keyword and 5-digit ZIP.
    pub address: Regex,

    /// ZIP code shape.
    pub zip: Regex,

    /// Labeled date section patterns.
    pub date_section_patterns: Vec<Regex>,
}

impl Patterns {
    /// Compile all patterns. Prefer [`Patterns::shared`] outside tests.
    #[allow(clippy::too_many_lines)]
    pub fn new() -> Self {
        Self {
            date_patterns: vec![
                Regex::new(r"\d{1,2}[/-]\d{1,2}[/-]\d{2,4}").unwrap(),
                Regex::new(r"\d{4}[/-]\d{1,2}[/-]\d{1,2}").unwrap(),
                Regex::new(
                    r"(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{1,2},?\s+\d{4}",
                )
                .unwrap(),
            ],
            invoice_number_patterns: vec![
                Regex::new(r"(?i)invoice\s+(?:no\.?|number)\s*:?\s*([0-9]{6,20})").unwrap(),
                Regex::new(r"(?i)(?:invoice|inv)\s*#\s*:?\s*([0-9]{6,20})").unwrap(),
                Regex::new(r"\b([0-9]{6,20})\b").unwrap(),
                Regex::new(r"(?i)(?:invoice|inv|#)\s*:?\s*([A-Z0-9\-]{6,20})").unwrap(),
                Regex::new(r"(?i)invoice\s+number\s*:?\s*([A-Z0-9\-]{6,20})").unwrap(),
            ],
            invoice_number_labeled: vec![
                Regex::new(r"(?i)invoice\s+(?:no\.?|number)\s*:?\s*([0-9]{6,20})").unwrap(),
                Regex::new(r"(?i)(?:invoice|inv)\s*#\s*:?\s*([0-9]{6,20})").unwrap(),
                Regex::new(r"(?i)invoice\s+(?:no\.?|number)\s*:?\s*([A-Z0-9\-]{6,20})").unwrap(),
            ],
            standalone_number: Regex::new(r"\b([0-9]{6,20})\b").unwrap(),
            invoice_number_exclusions: [
                "page",
                "switch",
                "date",
                "invoice",
                "total",
                "amount",
                "quantity",
                "description",
                "sku",
                "item",
                "account",
                "number",
                "po",
                "services",
            ]
            .into_iter()
            .collect(),
            price: Regex::new(r"[-+]?\$?\s*(\d{1,3}(?:,\d{3})*(?:\.\d{2})?)").unwrap(),
            negative_price: Regex::new(r"-\$?\s*(\d{1,3}(?:,\d{3})*(?:\.\d{2})?)").unwrap(),
            tax_rate: Regex::new(r"(\d+\.?\d*)\s*%").unwrap(),
            sku_patterns: vec![
                Regex::new(r"(?i)sku\s*:?\s*([A-Z0-9\-]+)").unwrap(),
                Regex::new(r"(?i)item\s*#\s*:?\s*([A-Z0-9\-]+)").unwrap(),
                Regex::new(r"(?i)product\s*code\s*:?\s*([A-Z0-9\-]+)").unwrap(),
                // Case-sensitive: a line-start code is all caps, ordinary
                // capitalized words are not.
                Regex::new(r"^([A-Z0-9\-]{3,15})\s+").unwrap(),
                Regex::new(r"\(([A-Z0-9\-]{3,20})\)").unwrap(),
            ],
            vendor_patterns: vec![
                Regex::new(r"(?im)(?:from|vendor|supplier)\s*:?\s*(.+?)(?:\n|$)").unwrap(),
                Regex::new(r"(?m)^([A-Z][A-Za-z\s&]+(?:Inc|LLC|Corp|Ltd|Company|Co)\.?)").unwrap(),
            ],
            payment_patterns: vec![
                Regex::new(r"(?im)please\s+make\s+payments\s+to\s*:?\s*(.+?)(?:\n|$)").unwrap(),
                Regex::new(r"(?im)make\s+payments\s+to\s*:?\s*(.+?)(?:\n|$)").unwrap(),
                Regex::new(r"(?im)payments\s+should\s+be\s+made\s+to\s*:?\s*(.+?)(?:\n|$)")
                    .unwrap(),
            ],
            bill_to_patterns: vec![
                Regex::new(r"(?im)bill\s+to\s*:?\s*(.+?)(?:\n|$)").unwrap(),
                Regex::new(r"(?im)bill\s+to\s*:?\s*\n\s*([A-Z][A-Za-z\s&]+)").unwrap(),
                Regex::new(r"(?im)sold\s+to\s*:?\s*(.+?)(?:\n|$)").unwrap(),
                Regex::new(r"(?im)customer\s*:?\s*(.+?)(?:\n|$)").unwrap(),
            ],
            address: Regex::new(
                r"(?i)(\d+\s+[A-Za-z0-9\s,]+(?:Street|St|Avenue|Ave|Road|Rd|Boulevard|Blvd|Drive|Dr)[\s\S]{0,200}?(?:\d{5}(?:-\d{4})?))",
            )
            .unwrap(),
            zip: Regex::new(r"\d{5}(?:-\d{4})?").unwrap(),
            date_section_patterns: vec![
                Regex::new(r"(?i)invoice\s+date\s*:?\s*([^\n]+)").unwrap(),
                Regex::new(r"(?i)date\s*:?\s*([^\n]+)").unwrap(),
                Regex::new(r"(?i)bill\s+date\s*:?\s*([^\n]+)").unwrap(),
            ],
        }
    }

    /// The process-wide shared registry, compiled on first access.
    pub fn shared() -> Arc<Patterns> {
        DEFAULT_PATTERNS.clone()
    }
}

impl Default for Patterns {
    fn default() -> Self {
        Self::new()
    }
}
