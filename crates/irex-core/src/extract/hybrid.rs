//! Hybrid reconciliation of structured and text-pattern drafts.
//!
//! Each field takes the structured value when present and falls back to
//! the OCR draft, with one exception: a remittance statement in the OCR
//! text names the party actually owed, so its vendor wins over the
//! structured vendor block.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, info};

use super::improve::LineItemImprover;
use super::ocr::OcrExtractor;
use super::structured::StructuredExtractor;
use super::{ExtractFields, FieldDraft, Patterns, SourceData};
use crate::models::config::ExtractionConfig;
use crate::models::record::InvoiceRecord;

/// Two-source extractor producing the final six-field record.
#[derive(Debug, Clone)]
pub struct HybridExtractor {
    config: ExtractionConfig,
    patterns: Arc<Patterns>,
    structured: StructuredExtractor,
    ocr: OcrExtractor,
    improver: LineItemImprover,
}

impl HybridExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self::with_patterns(config, Patterns::shared())
    }

    pub fn with_patterns(config: ExtractionConfig, patterns: Arc<Patterns>) -> Self {
        Self {
            structured: StructuredExtractor::new(),
            ocr: OcrExtractor::with_patterns(patterns.clone()),
            improver: LineItemImprover::with_patterns(config.clone(), patterns.clone()),
            config,
            patterns,
        }
    }

    /// Pin the OCR extractor's date plausibility window.
    pub fn with_reference_date(mut self, reference: NaiveDate) -> Self {
        self.ocr = self.ocr.with_reference_date(reference);
        self
    }

    /// Extract the final record from whatever sources are present.
    pub fn extract(&self, source: &SourceData) -> InvoiceRecord {
        // Structured responses often embed the raw OCR text; recover it
        // so the text strategies still run.
        let recovered = self.recovered_source(source);

        let use_structured = self.config.use_structured_data && recovered.response.is_some();
        let structured_draft = if use_structured {
            self.structured.extract_all_fields(&recovered)
        } else {
            FieldDraft::default()
        };
        let ocr_draft = if recovered.ocr_text.is_some() {
            self.ocr.extract_all_fields(&recovered)
        } else {
            FieldDraft::default()
        };

        let merged = if self.config.use_hybrid_extraction {
            self.merge(structured_draft, ocr_draft, recovered.ocr_text.as_deref())
        } else if use_structured {
            structured_draft
        } else {
            ocr_draft
        };

        let line_items = self.improver.improve(merged.line_items);
        info!(
            vendor = merged.vendor_name.as_deref().unwrap_or(""),
            items = line_items.len(),
            "extraction complete"
        );

        InvoiceRecord {
            vendor_name: merged.vendor_name.unwrap_or_default(),
            vendor_address: merged.vendor_address.unwrap_or_default(),
            bill_to_name: merged.bill_to_name.unwrap_or_default(),
            invoice_number: merged.invoice_number.unwrap_or_default(),
            date: merged.date.unwrap_or_default(),
            line_items,
        }
    }

    fn recovered_source(&self, source: &SourceData) -> SourceData {
        let mut recovered = source.clone();
        if recovered.ocr_text.is_none() {
            recovered.ocr_text = source
                .response
                .as_ref()
                .and_then(|r| r.get("ocr_text"))
                .and_then(Value::as_str)
                .map(str::to_string);
        }
        recovered
    }

    fn merge(
        &self,
        structured: FieldDraft,
        ocr: FieldDraft,
        ocr_text: Option<&str>,
    ) -> FieldDraft {
        let vendor_name = match self.remittance_vendor(ocr_text) {
            Some(name) => {
                debug!("remittance statement overrides structured vendor");
                Some(name)
            }
            None => structured.vendor_name.or(ocr.vendor_name),
        };

        let line_items = if !structured.line_items.is_empty() {
            structured.line_items
        } else {
            ocr.line_items
        };

        FieldDraft {
            vendor_name,
            vendor_address: structured.vendor_address.or(ocr.vendor_address),
            bill_to_name: structured.bill_to_name.or(ocr.bill_to_name),
            invoice_number: structured.invoice_number.or(ocr.invoice_number),
            date: structured.date.or(ocr.date),
            line_items,
        }
    }

    /// Vendor named by a "please make payments to" statement, if any.
    fn remittance_vendor(&self, ocr_text: Option<&str>) -> Option<String> {
        let text = ocr_text?;
        if self
            .patterns
            .payment_patterns
            .iter()
            .any(|p| p.is_match(text))
        {
            self.ocr.extract_vendor_name(text)
        } else {
            None
        }
    }
}

impl Default for HybridExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn config(structured: bool) -> ExtractionConfig {
        ExtractionConfig {
            use_structured_data: structured,
            use_hybrid_extraction: true,
            ..ExtractionConfig::default()
        }
    }

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn structured_fields_win_with_ocr_fallback() {
        let source = SourceData {
            ocr_text: Some(
                "Acme Networks Inc\nInvoice No. 5566771\nInvoice Date: 01/15/2024\n".to_string(),
            ),
            response: Some(json!({
                "vendor": {"name": {"value": "switch ltd"}},
            })),
        };
        let record = HybridExtractor::new(config(true))
            .with_reference_date(reference())
            .extract(&source);

        assert_eq!(record.vendor_name, "Switch Ltd.");
        // Structured response had no number or date; OCR fills them.
        assert_eq!(record.invoice_number, "5566771");
        assert_eq!(record.date, "01/15/2024");
    }

    #[test]
    fn remittance_statement_overrides_structured_vendor() {
        let source = SourceData {
            ocr_text: Some("Invoice\nPlease make payments to: Acme Corp\n".to_string()),
            response: Some(json!({"vendor": {"name": "Wrong Vendor LLC"}})),
        };
        let record = HybridExtractor::new(config(true))
            .with_reference_date(reference())
            .extract(&source);
        assert_eq!(record.vendor_name, "Acme Corp.");
    }

    #[test]
    fn ocr_text_recovered_from_response() {
        let source = SourceData::from_response(json!({
            "ocr_text": "Tech Solutions Inc\nInvoice No. 9988776\n",
        }));
        let record = HybridExtractor::new(config(false))
            .with_reference_date(reference())
            .extract(&source);
        assert_eq!(record.vendor_name, "Tech Solutions Inc.");
        assert_eq!(record.invoice_number, "9988776");
    }

    #[test]
    fn missing_fields_default_to_empty_strings() {
        let record = HybridExtractor::default().extract(&SourceData::default());
        assert_eq!(record, InvoiceRecord::empty());
        assert!(record.is_empty());
    }

    #[test]
    fn structured_line_items_preferred_when_enabled() {
        let source = SourceData {
            ocr_text: Some(
                "Description    Amount\nShould Not Appear    $5.00\n".to_string(),
            ),
            response: Some(json!({
                "line_items": [{"description": "Structured item", "total": 42.0}]
            })),
        };
        let record = HybridExtractor::new(config(true))
            .with_reference_date(reference())
            .extract(&source);
        assert_eq!(record.line_items.len(), 1);
        assert_eq!(record.line_items[0].description, "Structured item");
        assert_eq!(record.line_items[0].total, 42.0);
    }
}
