//! Line item segmentation over OCR text.
//!
//! The extractor locates the item table, walks its lines with a small
//! state machine (accumulate into the current item or start a new one),
//! and stops at the totals section. Monetary tokens on a line map
//! first-to-price, last-to-total; a single token sets both.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::Patterns;
use crate::models::record::LineItem;

lazy_static! {
    static ref PAREN_SKU: Regex = Regex::new(r"\((\d{3,12})\)").unwrap();
    static ref LEADING_QUANTITY: Regex = Regex::new(r"^(\d+\.?\d*)\s+").unwrap();
    static ref TOTALS_LINE: Regex = Regex::new(
        r"(?i)^(?:(?:invoice|bill|statement)\s+)?(?:subtotal|sales\s+tax|tax|total|amount\s+due|balance(?:\s+due)?|grand\s+total|final\s+total|payment\s+due|amount\s+owed)\b",
    )
    .unwrap();
    static ref COLUMN_SPLIT: Regex = Regex::new(r"\s{2,}").unwrap();
    static ref NUMERIC_ONLY: Regex = Regex::new(r"^[\d\s.,$%\-]+$").unwrap();
    static ref DATE_TOKEN: Regex = Regex::new(r"^\d{1,2}[/-]\d{1,2}[/-]\d{2,4}$").unwrap();
}

/// Keywords that mark the item table header row.
const HEADER_KEYWORDS: &[&str] = &["item", "description", "qty", "quantity", "price", "amount"];

/// Column labels counted when confirming a header row.
const COLUMN_KEYWORDS: &[&str] = &[
    "sku",
    "item",
    "description",
    "qty",
    "quantity",
    "price",
    "total",
    "amount",
];

/// Line openers that always begin a fresh item.
const ITEM_START_KEYWORDS: &[&str] = &[
    "transport",
    "installation",
    "carrier taxes",
    "carrier tax",
    "item discount",
    "discount",
    "credit",
    "refund",
    "deduction",
];

/// Service-type words used to spot a new item row without a keyword
/// opener.
const SERVICE_TYPES: &[&str] = &["transport", "installation", "carrier"];

/// Words that flip a following amount negative even without a minus
/// sign.
const DISCOUNT_KEYWORDS: &[&str] = &["discount", "credit", "refund", "deduction"];

/// Quantity sanity bounds.
const QUANTITY_MIN: f64 = 0.01;
const QUANTITY_MAX: f64 = 1_000_000.0;

/// A monetary token found on a line.
#[derive(Debug, Clone, Copy)]
struct PriceToken {
    value: f64,
    start: usize,
    end: usize,
}

/// Segments OCR text into line items.
#[derive(Debug, Clone)]
pub struct LineItemExtractor {
    patterns: Arc<Patterns>,
}

impl LineItemExtractor {
    pub fn new() -> Self {
        Self::with_patterns(Patterns::shared())
    }

    pub fn with_patterns(patterns: Arc<Patterns>) -> Self {
        Self { patterns }
    }

    /// Extract all line items from the document.
    pub fn extract(&self, text: &str) -> Vec<LineItem> {
        let lines: Vec<&str> = text.lines().collect();
        let start = self.find_table_start(&lines);

        let mut items: Vec<LineItem> = Vec::new();
        let mut current = LineItem::default();

        for line in lines.iter().skip(start) {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                // A blank row ends a complete item; a partial one keeps
                // accumulating across the gap.
                if is_complete(&current) {
                    self.flush(&mut items, &mut current);
                }
                continue;
            }

            if self.is_totals_line(trimmed) {
                debug!("totals section reached: {:?}", trimmed);
                break;
            }

            if self.starts_new_item(trimmed, &current) {
                self.flush(&mut items, &mut current);
            }
            self.merge_line(trimmed, &mut current);
        }
        self.flush(&mut items, &mut current);

        self.cleanup(items)
    }

    /// Index of the first line after the table header row, or 0 when no
    /// header is found.
    fn find_table_start(&self, lines: &[&str]) -> usize {
        for (idx, line) in lines.iter().enumerate() {
            let lower = line.to_lowercase();
            let has_header = HEADER_KEYWORDS.iter().any(|k| lower.contains(k));
            let columns = COLUMN_KEYWORDS
                .iter()
                .filter(|k| lower.contains(*k))
                .count();
            if has_header && columns >= 2 {
                return idx + 1;
            }
        }
        0
    }

    /// A totals line starts with a totals label (optionally prefixed by
    /// invoice/bill/statement) and carries a separator or amount marker.
    fn is_totals_line(&self, line: &str) -> bool {
        TOTALS_LINE.is_match(line) && line.contains([':', '=', '$'])
    }

    fn starts_new_item(&self, line: &str, current: &LineItem) -> bool {
        if current.description.is_empty() && current.sku.is_empty() {
            return false;
        }
        let lower = line.to_lowercase();
        if ITEM_START_KEYWORDS.iter().any(|k| lower.starts_with(k)) {
            return true;
        }

        let amounts = self.price_tokens(line).len();
        if amounts >= 2 && (current.price != 0.0 || current.total != 0.0) {
            return true;
        }

        // A capitalized service word opens a new row in tables without
        // blank-line separation.
        let first_word = line.split_whitespace().next().unwrap_or("");
        first_word.len() > 5
            && first_word.starts_with(|c: char| c.is_ascii_uppercase())
            && SERVICE_TYPES.iter().any(|k| lower.contains(k))
    }

    /// Fold one table line into the current item.
    fn merge_line(&self, line: &str, current: &mut LineItem) {
        let mut consumed: Vec<(usize, usize)> = Vec::new();

        if current.sku.is_empty() {
            if let Some(caps) = PAREN_SKU.captures(line) {
                let code = caps.get(1).unwrap();
                if !is_year_or_date(code.as_str()) {
                    current.sku = code.as_str().to_string();
                    let whole = caps.get(0).unwrap();
                    consumed.push((whole.start(), whole.end()));
                }
            }
        }

        if current.quantity == 0.0 {
            if let Some(caps) = LEADING_QUANTITY.captures(line) {
                if let Ok(value) = caps[1].parse::<f64>() {
                    if (QUANTITY_MIN..=QUANTITY_MAX).contains(&value) {
                        current.quantity = value;
                        let whole = caps.get(0).unwrap();
                        consumed.push((whole.start(), whole.end()));
                    }
                }
            }
        }

        let tokens = self.price_tokens(line);
        for token in &tokens {
            consumed.push((token.start, token.end));
        }
        // First amount fills price, last fills total; amounts already
        // set by an earlier line of the same item are kept.
        match tokens.as_slice() {
            [] => {}
            [only] => {
                if current.price == 0.0 {
                    current.price = only.value;
                }
                if current.total == 0.0 {
                    current.total = only.value;
                }
            }
            [first, .., last] => {
                if current.price == 0.0 {
                    current.price = first.value;
                }
                if current.total == 0.0 {
                    current.total = last.value;
                }
            }
        }

        let residual = mask_spans(line, &consumed);
        for part in COLUMN_SPLIT.split(&residual) {
            let part = part.trim().trim_matches(['(', ')']);
            // A short bare integer column is the quantity.
            if current.quantity == 0.0 && part.len() <= 4 && !part.is_empty()
                && part.chars().all(|c| c.is_ascii_digit())
            {
                if let Ok(value) = part.parse::<f64>() {
                    if (QUANTITY_MIN..=QUANTITY_MAX).contains(&value) {
                        current.quantity = value;
                        continue;
                    }
                }
            }
            if part.len() > 3 && !NUMERIC_ONLY.is_match(part) && !DATE_TOKEN.is_match(part) {
                if current.description.is_empty() {
                    current.description = part.to_string();
                } else {
                    current.description.push(' ');
                    current.description.push_str(part);
                }
            }
        }
    }

    /// Monetary tokens on a line: require a currency or decimal marker
    /// so bare quantities are not mistaken for amounts, and skip numbers
    /// that belong to a percentage. Sign comes from a leading minus or a
    /// preceding discount keyword.
    fn price_tokens(&self, line: &str) -> Vec<PriceToken> {
        let lower = line.to_lowercase();
        let keyword_pos = DISCOUNT_KEYWORDS
            .iter()
            .filter_map(|k| lower.find(k))
            .min();
        let percent_spans: Vec<(usize, usize)> = self
            .patterns
            .tax_rate
            .find_iter(line)
            .map(|m| (m.start(), m.end()))
            .collect();

        let mut tokens = Vec::new();
        for caps in self.patterns.price.captures_iter(line) {
            let whole = caps.get(0).unwrap();
            let matched = whole.as_str();
            if !matched.contains(['$', '.', ',']) {
                continue;
            }
            let digits = caps.get(1).unwrap();
            if percent_spans
                .iter()
                .any(|&(start, end)| digits.start() >= start && digits.end() <= end)
            {
                continue;
            }
            let Ok(mut value) = digits.as_str().replace(',', "").parse::<f64>() else {
                continue;
            };

            let explicit_minus = self.patterns.negative_price.is_match(matched);
            let after_discount = keyword_pos
                .is_some_and(|pos| pos < whole.start() && tokens.is_empty());
            if explicit_minus || after_discount {
                value = -value;
            }

            tokens.push(PriceToken {
                value,
                start: whole.start(),
                end: whole.end(),
            });
        }
        tokens
    }

    fn flush(&self, items: &mut Vec<LineItem>, current: &mut LineItem) {
        let done = std::mem::take(current);
        if is_complete(&done) {
            items.push(done);
        }
    }

    /// Final pass: drop rows that carry neither a description nor a
    /// SKU, and align price sign with a negative total on discount
    /// rows.
    fn cleanup(&self, items: Vec<LineItem>) -> Vec<LineItem> {
        let mut out: Vec<LineItem> = items
            .into_iter()
            .filter(|item| !item.description.is_empty() || !item.sku.is_empty())
            .collect();

        for item in &mut out {
            let lower = item.description.to_lowercase();
            let discountish = DISCOUNT_KEYWORDS.iter().any(|k| lower.contains(k));
            if item.total < 0.0 && item.price > 0.0 && discountish {
                item.price = -item.price;
            }
        }
        out
    }
}

impl Default for LineItemExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// An item is complete once it has a description and an amount.
fn is_complete(item: &LineItem) -> bool {
    !item.description.is_empty() && (item.price != 0.0 || item.total != 0.0)
}

/// Reject parenthetical codes that are actually years or dates.
fn is_year_or_date(code: &str) -> bool {
    if code.len() == 4 {
        if let Ok(year) = code.parse::<u32>() {
            return (1900..=2100).contains(&year);
        }
    }
    false
}

/// Blank out the given byte spans, leaving the rest of the line intact
/// for description extraction.
fn mask_spans(line: &str, spans: &[(usize, usize)]) -> String {
    let mut bytes: Vec<u8> = line.bytes().collect();
    for &(start, end) in spans {
        for b in &mut bytes[start..end.min(line.len())] {
            if !b.is_ascii_whitespace() {
                *b = b' ';
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extractor() -> LineItemExtractor {
        LineItemExtractor::new()
    }

    #[test]
    fn single_line_items_with_price_and_total() {
        let text = "Description    Qty    Price    Total\n\
                    Fiber Transport Service    1    $1,200.00    $1,200.00\n\
                    Installation Fee    1    $250.00    $250.00\n\
                    Total: $1,450.00\n";
        let items = extractor().extract(text);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Fiber Transport Service");
        assert_eq!(items[0].quantity, 1.0);
        assert_eq!(items[0].price, 1200.0);
        assert_eq!(items[0].total, 1200.0);
        assert_eq!(items[1].description, "Installation Fee");
        assert_eq!(items[1].price, 250.0);
    }

    #[test]
    fn parenthetical_sku_captured() {
        let text = "Item    Description    Amount\n\
                    Transport circuit (88412345)    $500.00\n";
        let items = extractor().extract(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sku, "88412345");
        assert_eq!(items[0].description, "Transport circuit");
        assert_eq!(items[0].price, 500.0);
        assert_eq!(items[0].total, 500.0);
    }

    #[test]
    fn parenthetical_year_is_not_a_sku() {
        let text = "Description    Amount\n\
                    Annual support (2024)    $99.00\n";
        let items = extractor().extract(text);
        assert_eq!(items[0].sku, "");
    }

    #[test]
    fn discount_line_goes_negative() {
        let text = "Description    Amount\n\
                    Carrier Service    $800.00\n\
                    Item Discount    -$50.00\n\
                    Total: $750.00\n";
        let items = extractor().extract(text);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].total, -50.0);
        assert_eq!(items[1].price, -50.0);
    }

    #[test]
    fn discount_keyword_flips_unsigned_amount() {
        let ex = extractor();
        let tokens = ex.price_tokens("Credit for outage    $25.00");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, -25.0);
    }

    #[test]
    fn totals_section_terminates_the_table() {
        let text = "Description    Amount\n\
                    Managed Service    $100.00\n\
                    Subtotal: $100.00\n\
                    Stray line after totals    $999.00\n";
        let items = extractor().extract(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total, 100.0);
    }

    #[test]
    fn wrapped_description_accumulates() {
        let text = "Description    Amount\n\
                    Gigabit Transport Service\n\
                    from DC1 to DC2    $2,000.00\n";
        let items = extractor().extract(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Gigabit Transport Service from DC1 to DC2");
        assert_eq!(items[0].total, 2000.0);
    }

    #[test]
    fn blank_line_separates_complete_items() {
        let text = "Description    Amount\n\
                    Fiber Service    $100.00\n\
                    \n\
                    Managed Support    $200.00\n";
        let items = extractor().extract(text);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Fiber Service");
        assert_eq!(items[0].total, 100.0);
        assert_eq!(items[1].description, "Managed Support");
        assert_eq!(items[1].total, 200.0);
    }

    #[test]
    fn blank_line_keeps_a_partial_item_open() {
        let text = "Description    Amount\n\
                    Gigabit Transport Service\n\
                    \n\
                    from DC1 to DC2    $2,000.00\n";
        let items = extractor().extract(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].total, 2000.0);
    }

    #[test]
    fn continuation_amount_does_not_clobber_set_fields() {
        let text = "Description    Amount\n\
                    Managed Firewall    $150.00\n\
                    with premium support    $999.00\n";
        let items = extractor().extract(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price, 150.0);
        assert_eq!(items[0].total, 150.0);
    }

    #[test]
    fn no_header_still_extracts() {
        let text = "Fiber link (5541123)    $75.00\n";
        let items = extractor().extract(text);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sku, "5541123");
    }

    #[test]
    fn percentage_is_not_a_price() {
        let ex = extractor();
        let tokens = ex.price_tokens("State tax 8.50% applied    $10.00");
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].value, 10.0);
    }

    #[test]
    fn per_item_tax_rate_is_zero() {
        let text = "Description    Amount\nService with 8.5% tax    $108.50\n";
        let items = extractor().extract(text);
        assert_eq!(items[0].tax_rate, 0.0);
    }
}
