//! Field extraction from raw OCR text.
//!
//! Each field has an ordered list of strategies, most reliable first:
//! labeled sections, then positional heuristics over the document head,
//! then whole-document pattern fallbacks. A strategy that finds nothing
//! hands off to the next; a full miss yields `None` for that field.

use std::sync::Arc;

use chrono::{Local, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::line_items::LineItemExtractor;
use super::{company, dates, ExtractFields, FieldDraft, Patterns, SourceData};

/// Lines of the document head scanned for labeled invoice numbers and
/// date sections.
const HEADER_LINES: usize = 30;

/// Characters of surrounding context examined around a bare token.
const CONTEXT_WINDOW: usize = 50;

/// Non-empty lines from the top considered as vendor name candidates.
const VENDOR_CANDIDATE_LINES: usize = 8;

/// Lines scanned below the vendor line for address content.
const ADDRESS_SCAN_LINES: usize = 15;

lazy_static! {
    static ref PAGE_LINE: Regex = Regex::new(r"(?i)^page\s+\d+").unwrap();
    static ref DATE_LINE: Regex = Regex::new(r"^\d+[/-]\d+[/-]\d+").unwrap();
    static ref NUMERIC_LINE: Regex = Regex::new(r"^#?\s*\d+").unwrap();
    static ref PARTIAL_DATE_LINE: Regex = Regex::new(r"^\d{1,2}[/-]").unwrap();
    static ref DATE_SHAPED: Regex = Regex::new(r"^\d{1,2}[/-]\d{1,2}[/-]\d{2,4}$").unwrap();
    static ref ALNUM_CODE: Regex = Regex::new(r"(?i)^[A-Z0-9\-]+$").unwrap();
    static ref NAME_SHAPED: Regex = Regex::new(r"^[A-Z][A-Za-z0-9\s&,.\-']+$").unwrap();
    static ref TABLE_COLUMN_PREFIX: Regex = Regex::new(r"^\d+\s*\t\s*\d+").unwrap();
}

/// Words a vendor-candidate line must not contain.
const VENDOR_FALSE_POSITIVES: &[&str] = &[
    "page",
    "invoice",
    "date",
    "total",
    "amount",
    "due",
    "bill to",
    "ship to",
    "sold to",
    "please make payments",
];

/// Street-type tokens used to recognize address lines.
const STREET_KEYWORDS: &[&str] = &[
    "street", "st", "avenue", "ave", "road", "rd", "blvd", "drive", "dr",
];

/// Section labels that terminate vendor address collection.
const ADDRESS_STOP_WORDS: &[&str] = &[
    "invoice",
    "date",
    "bill to",
    "ship to",
    "item",
    "description",
    "account no",
    "account number",
    "p.o.",
    "po number",
    "services for month",
    "services for",
    "account",
    "po-",
    "account:",
];

/// Labels that introduce the bill-to block.
const BILL_TO_LABELS: &[&str] = &["bill to", "billto", "sold to", "customer:"];

/// Metadata lines skipped while scanning below a bill-to label.
const BILL_TO_METADATA: &[&str] = &[
    "account",
    "po",
    "p.o.",
    "services for month",
    "invoice",
    "date",
];

/// Keywords near a bare numeric token that mark it as an invoice number.
const INVOICE_CONTEXT_KEYWORDS: &[&str] = &["invoice", "inv", "no.", "number"];

/// Text-pattern field extractor over raw OCR text.
#[derive(Debug, Clone)]
pub struct OcrExtractor {
    patterns: Arc<Patterns>,
    reference_date: NaiveDate,
    line_items: LineItemExtractor,
}

impl OcrExtractor {
    /// Extractor with the shared pattern registry and today as the date
    /// plausibility reference.
    pub fn new() -> Self {
        Self::with_patterns(Patterns::shared())
    }

    pub fn with_patterns(patterns: Arc<Patterns>) -> Self {
        Self {
            line_items: LineItemExtractor::with_patterns(patterns.clone()),
            patterns,
            reference_date: Local::now().date_naive(),
        }
    }

    /// Pin the date plausibility window to a fixed reference date.
    pub fn with_reference_date(mut self, reference: NaiveDate) -> Self {
        self.reference_date = reference;
        self
    }

    // --- vendor name ---

    /// Vendor name via remittance statement, document head, then label
    /// patterns.
    pub fn extract_vendor_name(&self, text: &str) -> Option<String> {
        if let Some(name) = self.vendor_from_payment_statement(text) {
            debug!("vendor name from remittance statement: {}", name);
            return Some(name);
        }
        if let Some(name) = self.vendor_from_document_head(text) {
            debug!("vendor name from document head: {}", name);
            return Some(name);
        }
        self.vendor_from_label_patterns(text)
    }

    fn vendor_from_payment_statement(&self, text: &str) -> Option<String> {
        for pattern in &self.patterns.payment_patterns {
            if let Some(caps) = pattern.captures(text) {
                let raw = caps[1].trim().trim_end_matches(['.', ',', ';']);
                if raw.len() > 2 {
                    if let Some(name) = company::clean_vendor_name(raw) {
                        return Some(name);
                    }
                }
            }
        }
        None
    }

    fn vendor_from_document_head(&self, text: &str) -> Option<String> {
        for line in non_empty_lines(text).take(VENDOR_CANDIDATE_LINES) {
            let lower = line.to_lowercase();
            if VENDOR_FALSE_POSITIVES.iter().any(|w| lower.contains(w)) {
                continue;
            }
            if PAGE_LINE.is_match(line)
                || DATE_LINE.is_match(line)
                || NUMERIC_LINE.is_match(line)
                || PARTIAL_DATE_LINE.is_match(line)
            {
                continue;
            }
            if line.len() <= 3 || line.len() >= 100 {
                continue;
            }
            return company::clean_vendor_name(line);
        }
        None
    }

    fn vendor_from_label_patterns(&self, text: &str) -> Option<String> {
        for pattern in &self.patterns.vendor_patterns {
            if let Some(caps) = pattern.captures(text) {
                if let Some(name) = company::clean_vendor_name(caps[1].trim()) {
                    if name.len() > 3 {
                        return Some(name);
                    }
                }
            }
        }
        None
    }

    // --- vendor address ---

    /// Address lines immediately below the vendor-name line, falling
    /// back to a whole-document street/ZIP pattern search.
    pub fn extract_vendor_address(&self, text: &str, vendor_name: Option<&str>) -> Option<String> {
        if let Some(name) = vendor_name {
            if let Some(address) = self.address_below_vendor_line(text, name) {
                return Some(address);
            }
        }
        self.patterns
            .address
            .captures(text)
            .map(|caps| normalize_address_block(&caps[1]))
    }

    fn address_below_vendor_line(&self, text: &str, vendor_name: &str) -> Option<String> {
        let lines: Vec<&str> = text.lines().collect();
        // Cleaned names carry canonical suffix punctuation the raw line
        // may lack ("Inc." vs "Inc"), so match without it.
        let name_lower = vendor_name
            .to_lowercase()
            .trim_end_matches(['.', ','])
            .to_string();

        let start = lines
            .iter()
            .take(20)
            .position(|line| line.to_lowercase().contains(&name_lower))?
            + 1;

        let mut collected: Vec<String> = Vec::new();
        for line in lines.iter().skip(start).take(ADDRESS_SCAN_LINES) {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                if collected.len() >= 2 {
                    break;
                }
                continue;
            }

            let lower = trimmed.to_lowercase();
            if ADDRESS_STOP_WORDS.iter().any(|w| lower.contains(w)) {
                break;
            }

            let address_like = trimmed.chars().any(|c| c.is_ascii_digit())
                || has_street_keyword(trimmed)
                || self.patterns.zip.is_match(trimmed);
            if address_like {
                let cleaned = TABLE_COLUMN_PREFIX
                    .replace(trimmed, "")
                    .replace('\t', " ")
                    .trim()
                    .to_string();
                if !cleaned.is_empty() {
                    collected.push(cleaned);
                }
            }
            if collected.len() >= 4 {
                break;
            }
        }

        if collected.is_empty() {
            return None;
        }
        let joined = collected.join(", ");

        // Reject header fragments picked up by accident: a real address
        // carries a ZIP, or at least a digit plus a street keyword.
        let has_zip = self.patterns.zip.is_match(&joined);
        let has_digit_street =
            joined.chars().any(|c| c.is_ascii_digit()) && has_street_keyword(&joined);
        if has_zip || has_digit_street {
            Some(joined)
        } else {
            None
        }
    }

    // --- bill-to ---

    /// Customer name below a bill-to label, with a label-pattern
    /// fallback over the whole document.
    pub fn extract_bill_to_name(&self, text: &str) -> Option<String> {
        if let Some(name) = self.bill_to_below_label(text) {
            return Some(name);
        }
        self.bill_to_from_label_patterns(text)
    }

    fn bill_to_below_label(&self, text: &str) -> Option<String> {
        let lines: Vec<&str> = text.lines().collect();

        for (idx, line) in lines.iter().take(50).enumerate() {
            let lower = line.to_lowercase();
            if !BILL_TO_LABELS.iter().any(|label| lower.contains(label)) {
                continue;
            }

            for candidate in lines.iter().skip(idx + 1).take(10) {
                let trimmed = candidate.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let candidate_lower = trimmed.to_lowercase();
                if trimmed.starts_with(|c: char| c.is_ascii_digit())
                    || has_street_keyword(trimmed)
                {
                    continue;
                }
                if BILL_TO_METADATA.iter().any(|w| candidate_lower.contains(w)) {
                    continue;
                }
                if trimmed.len() >= 3 && trimmed.len() <= 100 && NAME_SHAPED.is_match(trimmed) {
                    if let Some(name) = company::clean_company_name(trimmed) {
                        return Some(name);
                    }
                }
            }
        }
        None
    }

    fn bill_to_from_label_patterns(&self, text: &str) -> Option<String> {
        const FALSE_POSITIVES: &[&str] = &[
            "date",
            "invoice",
            "total",
            "amount",
            "quantity",
            "description",
        ];
        for pattern in &self.patterns.bill_to_patterns {
            if let Some(caps) = pattern.captures(text) {
                let raw = caps[1].trim();
                let lower = raw.to_lowercase();
                if FALSE_POSITIVES.iter().any(|w| lower.contains(w)) {
                    continue;
                }
                if let Some(name) = company::clean_company_name(raw) {
                    return Some(name);
                }
            }
        }
        None
    }

    // --- invoice number ---

    /// Invoice number via labeled header patterns, keyword-context bare
    /// tokens, then whole-document patterns.
    pub fn extract_invoice_number(&self, text: &str) -> Option<String> {
        let header: String = text
            .lines()
            .take(HEADER_LINES)
            .collect::<Vec<_>>()
            .join("\n");

        for pattern in &self.patterns.invoice_number_labeled {
            if let Some(caps) = pattern.captures(&header) {
                let candidate = caps[1].trim();
                if self.is_valid_invoice_number(candidate) {
                    debug!("invoice number from labeled header: {}", candidate);
                    return Some(candidate.to_string());
                }
            }
        }

        if let Some(number) = self.invoice_number_from_context(&header) {
            return Some(number);
        }

        for pattern in &self.patterns.invoice_number_patterns {
            if let Some(caps) = pattern.captures(text) {
                let candidate = caps[1].trim();
                if self.is_valid_invoice_number(candidate) {
                    return Some(candidate.to_string());
                }
            }
        }
        None
    }

    /// Bare 6-20 digit tokens with an invoice keyword nearby, scanned
    /// over the header only. The earliest such token wins.
    fn invoice_number_from_context(&self, text: &str) -> Option<String> {
        for m in self.patterns.standalone_number.find_iter(text) {
            let start = floor_char(text, m.start().saturating_sub(CONTEXT_WINDOW));
            let end = floor_char(text, (m.end() + CONTEXT_WINDOW).min(text.len()));
            let window = text[start..end].to_lowercase();
            if INVOICE_CONTEXT_KEYWORDS.iter().any(|k| window.contains(k))
                && self.is_valid_invoice_number(m.as_str())
            {
                return Some(m.as_str().to_string());
            }
        }
        None
    }

    fn is_valid_invoice_number(&self, candidate: &str) -> bool {
        if candidate.len() < 6 || candidate.len() > 20 {
            return false;
        }
        let lower = candidate.to_lowercase();
        if self.patterns.invoice_number_exclusions.contains(lower.as_str()) {
            return false;
        }
        if candidate.chars().all(|c| c.is_ascii_lowercase()) {
            return false;
        }
        if DATE_SHAPED.is_match(candidate) {
            return false;
        }
        candidate.chars().all(|c| c.is_ascii_digit()) || ALNUM_CODE.is_match(candidate)
    }

    // --- date ---

    /// Invoice date via labeled sections in the header, then bare date
    /// tokens ranked by surrounding context.
    pub fn extract_date(&self, text: &str) -> Option<String> {
        if let Some(date) = self.date_from_labeled_section(text) {
            return Some(date);
        }
        self.date_from_scored_tokens(text)
    }

    fn date_from_labeled_section(&self, text: &str) -> Option<String> {
        // Pattern-major: the whole header is searched for the most
        // specific label ("invoice date") before a generic "date" line
        // anywhere is considered.
        for pattern in &self.patterns.date_section_patterns {
            for line in text.lines().take(HEADER_LINES) {
                let Some(caps) = pattern.captures(line) else {
                    continue;
                };
                let section = caps[1].trim();
                // Prefer a recognizable date token inside the captured
                // section over the section as a whole.
                let token = self
                    .patterns
                    .date_patterns
                    .iter()
                    .find_map(|p| p.find(section))
                    .map_or(section, |m| m.as_str());
                if let Some(date) = dates::parse_date(token) {
                    if dates::is_plausible(date, self.reference_date) {
                        return Some(dates::format_mdy(date));
                    }
                }
            }
        }
        None
    }

    /// Score every bare date token by nearby keywords and take the best
    /// plausible one; an implausible-but-parseable token is the last
    /// resort.
    fn date_from_scored_tokens(&self, text: &str) -> Option<String> {
        let mut candidates: Vec<(i32, usize, &str)> = Vec::new();

        for pattern in &self.patterns.date_patterns {
            for m in pattern.find_iter(text) {
                let start = floor_char(text, m.start().saturating_sub(30));
                let end = floor_char(text, (m.end() + 30).min(text.len()));
                let window = text[start..end].to_lowercase();

                let mut score = 0;
                if ["invoice", "date", "bill"].iter().any(|k| window.contains(k)) {
                    score += 10;
                }
                if !window.contains("due") {
                    score += 5;
                }
                candidates.push((score, m.start(), m.as_str()));
            }
        }

        candidates.sort_by_key(|(score, pos, _)| (-score, *pos));

        let mut fallback = None;
        for (_, _, token) in &candidates {
            if let Some(date) = dates::parse_date(token) {
                if dates::is_plausible(date, self.reference_date) {
                    return Some(dates::format_mdy(date));
                }
                fallback.get_or_insert(dates::format_mdy(date));
            }
        }
        fallback
    }
}

impl Default for OcrExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractFields for OcrExtractor {
    fn extract_all_fields(&self, source: &SourceData) -> FieldDraft {
        let Some(text) = source.ocr_text.as_deref() else {
            return FieldDraft::default();
        };
        let vendor_name = self.extract_vendor_name(text);
        let vendor_address = self.extract_vendor_address(text, vendor_name.as_deref());
        FieldDraft {
            bill_to_name: self.extract_bill_to_name(text),
            invoice_number: self.extract_invoice_number(text),
            date: self.extract_date(text),
            line_items: self.line_items.extract(text),
            vendor_name,
            vendor_address,
        }
    }
}

fn non_empty_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|l| !l.is_empty())
}

/// Whole-token street keyword check. Substring matching would let "st"
/// inside "customer" mark a name line as an address.
fn has_street_keyword(line: &str) -> bool {
    line.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| {
            let token = token.to_lowercase();
            STREET_KEYWORDS.contains(&token.as_str())
        })
}

fn normalize_address_block(block: &str) -> String {
    block
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Snap a byte offset back to the nearest char boundary at or below it.
fn floor_char(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}
