//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// Main configuration for the irex pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IrexConfig {
    /// Hybrid extraction configuration.
    pub extraction: ExtractionConfig,

    /// Document format gate thresholds.
    pub format_gate: FormatGateConfig,
}

/// Invoice extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Use structured API response fields when a response is present.
    pub use_structured_data: bool,

    /// Combine structured and OCR sources per field.
    pub use_hybrid_extraction: bool,

    /// Character class accepted for SKU codes.
    pub sku_charset: SkuCharset,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            use_structured_data: false,
            use_hybrid_extraction: true,
            sku_charset: SkuCharset::Numeric,
        }
    }
}

/// Character class accepted when extracting SKU codes from descriptions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkuCharset {
    /// Digits only, 3-12 characters. The production default: carrier
    /// invoices use numeric product codes in parentheses.
    #[default]
    Numeric,
    /// Uppercase letters, digits, and hyphens, 3-20 characters.
    Alphanumeric,
}

/// Thresholds for the invoice format gate applied before extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatGateConfig {
    /// Minimum OCR text length in characters.
    pub min_ocr_length: usize,

    /// How many of the required keywords (invoice/total/date) must appear.
    pub required_keyword_count: usize,

    /// Minimum number of price-shaped tokens.
    pub min_price_tokens: usize,
}

impl Default for FormatGateConfig {
    fn default() -> Self {
        Self {
            min_ocr_length: 100,
            required_keyword_count: 2,
            min_price_tokens: 1,
        }
    }
}

impl IrexConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
