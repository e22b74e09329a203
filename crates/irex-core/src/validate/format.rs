//! Invoice format gate.
//!
//! Screens OCR text before the extraction pipeline runs: a document
//! that is too short, lacks invoice vocabulary, or carries no monetary
//! tokens is not an invoice and extraction would only produce noise.

use std::sync::Arc;

use tracing::debug;

use super::Validate;
use crate::extract::Patterns;
use crate::models::config::FormatGateConfig;

/// Vocabulary expected somewhere in an invoice document.
const REQUIRED_KEYWORDS: &[&str] = &["invoice", "total", "date"];

/// Pre-extraction gate over raw OCR text.
#[derive(Debug, Clone)]
pub struct FormatValidator {
    config: FormatGateConfig,
    patterns: Arc<Patterns>,
}

impl FormatValidator {
    pub fn new(config: FormatGateConfig) -> Self {
        Self::with_patterns(config, Patterns::shared())
    }

    pub fn with_patterns(config: FormatGateConfig, patterns: Arc<Patterns>) -> Self {
        Self { config, patterns }
    }
}

impl Default for FormatValidator {
    fn default() -> Self {
        Self::new(FormatGateConfig::default())
    }
}

impl Validate<str> for FormatValidator {
    fn problems(&self, text: &str) -> Vec<String> {
        let mut problems = Vec::new();

        if text.len() < self.config.min_ocr_length {
            problems.push(format!(
                "text too short: {} chars, need {}",
                text.len(),
                self.config.min_ocr_length
            ));
        }

        let lower = text.to_lowercase();
        let keywords = REQUIRED_KEYWORDS
            .iter()
            .filter(|k| lower.contains(*k))
            .count();
        if keywords < self.config.required_keyword_count {
            problems.push(format!(
                "only {} of {} required keywords present",
                keywords, self.config.required_keyword_count
            ));
        }

        let prices = self.patterns.price.find_iter(text).count();
        if prices < self.config.min_price_tokens {
            problems.push(format!(
                "only {} price tokens, need {}",
                prices, self.config.min_price_tokens
            ));
        }

        if !problems.is_empty() {
            debug!("format gate rejected document: {:?}", problems);
        }
        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice_text() -> String {
        format!(
            "Invoice No. 5566771\nInvoice Date: 01/15/2024\nTotal: $1,200.00\n{}",
            "x".repeat(100)
        )
    }

    #[test]
    fn accepts_invoice_shaped_text() {
        let gate = FormatValidator::default();
        assert!(gate.is_valid(&invoice_text()));
    }

    #[test]
    fn rejects_short_text() {
        let gate = FormatValidator::default();
        let problems = gate.problems("Invoice Total: $5.00");
        assert!(problems.iter().any(|p| p.contains("too short")));
    }

    #[test]
    fn rejects_missing_keywords() {
        let gate = FormatValidator::default();
        let text = format!("Receipt\n$5.00\n{}", "x".repeat(100));
        let problems = gate.problems(&text);
        assert!(problems.iter().any(|p| p.contains("keywords")));
    }

    #[test]
    fn rejects_text_without_prices() {
        let config = FormatGateConfig {
            min_price_tokens: 1,
            ..FormatGateConfig::default()
        };
        let gate = FormatValidator::new(config);
        let text = format!("Invoice date and total words only\n{}", "y".repeat(100));
        let problems = gate.problems(&text);
        assert!(problems.iter().any(|p| p.contains("price tokens")));
    }
}
