//! Core library for hybrid invoice extraction.
//!
//! This crate provides:
//! - A compiled regex pattern registry for invoice fields
//! - Text-pattern field extraction from OCR text (vendor, bill-to, invoice number, date)
//! - Structured field extraction from a key/value API response
//! - Line item segmentation and post-processing (SKU, classification, description cleanup)
//! - Hybrid reconciliation of both sources into a single normalized record

pub mod error;
pub mod extract;
pub mod models;
pub mod validate;

pub use error::{IrexError, Result};
pub use extract::hybrid::HybridExtractor;
pub use extract::line_items::LineItemExtractor;
pub use extract::ocr::OcrExtractor;
pub use extract::structured::StructuredExtractor;
pub use extract::{ExtractFields, FieldDraft, SourceData};
pub use models::config::{ExtractionConfig, FormatGateConfig, IrexConfig, SkuCharset};
pub use models::record::{InvoiceRecord, LineItem};
pub use validate::{FormatValidator, RecordValidator, Validate};

/// Run the full pipeline over OCR text: format gate, then hybrid
/// extraction.
///
/// Returns [`IrexError::UnsupportedFormat`] when the text does not look
/// like an invoice. Callers that want to extract anyway can drive
/// [`HybridExtractor`] directly.
pub fn process_text(text: &str, config: &IrexConfig) -> Result<InvoiceRecord> {
    let gate = FormatValidator::new(config.format_gate.clone());
    let problems = gate.problems(text);
    if !problems.is_empty() {
        return Err(IrexError::UnsupportedFormat(problems.join("; ")));
    }

    let extractor = HybridExtractor::new(config.extraction.clone());
    Ok(extractor.extract(&SourceData::from_text(text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_text_gates_non_invoices() {
        let config = IrexConfig::default();
        let err = process_text("not an invoice", &config).unwrap_err();
        assert!(matches!(err, IrexError::UnsupportedFormat(_)));
    }
}
