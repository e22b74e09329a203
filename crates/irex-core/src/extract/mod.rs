//! Field extraction module.
//!
//! Two field extractors (text-pattern and structured) produce per-field
//! drafts; the hybrid reconciler merges them into one [`InvoiceRecord`]
//! using defined precedence.

pub mod company;
pub mod dates;
pub mod hybrid;
pub mod improve;
pub mod line_items;
pub mod ocr;
pub mod patterns;
pub mod structured;

pub use hybrid::HybridExtractor;
pub use line_items::LineItemExtractor;
pub use ocr::OcrExtractor;
pub use patterns::Patterns;
pub use structured::StructuredExtractor;

use serde_json::Value;

use crate::models::record::LineItem;

/// Per-document extraction input. Either part may be absent.
#[derive(Debug, Clone, Default)]
pub struct SourceData {
    /// Raw multi-line OCR text.
    pub ocr_text: Option<String>,
    /// Structured key/value response tree. Leaf values may be plain
    /// scalars or `{"value": scalar}` wrappers.
    pub response: Option<Value>,
}

impl SourceData {
    /// Build a source from OCR text only.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            ocr_text: Some(text.into()),
            response: None,
        }
    }

    /// Build a source from a structured response only.
    pub fn from_response(response: Value) -> Self {
        Self {
            ocr_text: None,
            response: Some(response),
        }
    }
}

/// Draft of extracted fields from a single source. `None` means the
/// source had nothing for that field; the reconciler resolves defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldDraft {
    pub vendor_name: Option<String>,
    pub vendor_address: Option<String>,
    pub bill_to_name: Option<String>,
    pub invoice_number: Option<String>,
    pub date: Option<String>,
    pub line_items: Vec<LineItem>,
}

/// Trait for field extractors. Implementations are swappable strategy
/// objects; a miss on any individual field degrades to `None`, never an
/// error.
pub trait ExtractFields {
    /// Extract every field the source can provide.
    fn extract_all_fields(&self, source: &SourceData) -> FieldDraft;
}
