//! Company name cleaning and normalization.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    static ref LABEL_PREFIX: Regex =
        Regex::new(r"(?i)^(bill\s+to|sold\s+to|customer)\s*:?\s*").unwrap();
    static ref TRAILING_PUNCT: Regex = Regex::new(r"[.,;]+$").unwrap();
}

/// Known remittance domains mapped to canonical legal names. A domain
/// match short-circuits all further cleaning.
const DOMAIN_NAMES: &[(&str, &str)] = &[
    ("fb.com", "Facebook, Inc."),
    ("facebook.com", "Facebook, Inc."),
    ("google.com", "Google LLC"),
    ("amazon.com", "Amazon.com, Inc."),
    ("apple.com", "Apple Inc."),
];

/// Corporate suffix vocabulary with canonical renderings.
const SUFFIXES: &[(&str, &str)] = &[
    ("ltd", "Ltd."),
    ("inc", "Inc."),
    ("llc", "LLC"),
    ("corp", "Corp."),
    ("corporation", "Corporation"),
    ("company", "Company"),
    ("co", "Co."),
];

/// Clean and normalize a vendor name.
///
/// Collapses whitespace, maps known remittance domains to canonical
/// legal names, and otherwise capitalizes word by word while preserving
/// corporate suffixes (`ltd` -> `Ltd.`, `inc` -> `Inc.`, ...).
pub fn clean_vendor_name(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    let lower = collapsed.to_lowercase();
    for (domain, canonical) in DOMAIN_NAMES {
        if lower.contains(domain) {
            debug!("mapped remittance domain {} to {}", domain, canonical);
            return Some((*canonical).to_string());
        }
    }

    let mut words = Vec::new();
    for (i, word) in collapsed.split(' ').enumerate() {
        let trail: String = word
            .chars()
            .rev()
            .take_while(|c| *c == ',' || *c == '.')
            .collect();
        let core = &word[..word.len() - trail.len()];
        if core.is_empty() {
            continue;
        }

        let core_lower = core.to_lowercase();
        let suffix = SUFFIXES
            .iter()
            .find(|(key, _)| i > 0 && core_lower == *key)
            .map(|(_, canonical)| *canonical);

        match suffix {
            Some(canonical) => words.push(canonical.to_string()),
            None => {
                // Preserve a trailing comma between name and suffix, drop
                // stray periods.
                let trail: String = trail.chars().rev().filter(|c| *c == ',').collect();
                words.push(format!("{}{}", capitalize(core), trail));
            }
        }
    }

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

/// Clean and validate a bill-to/customer company name. Returns `None`
/// when the candidate is too short, too long, or not name-shaped.
pub fn clean_company_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let without_label = LABEL_PREFIX.replace(trimmed, "");
    let cleaned = TRAILING_PUNCT.replace(without_label.trim(), "");
    let cleaned = cleaned.trim();

    if cleaned.len() < 3 || cleaned.len() > 100 {
        return None;
    }
    if !cleaned.chars().next().is_some_and(|c| c.is_alphabetic()) {
        return None;
    }

    Some(cleaned.to_string())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn suffix_normalization() {
        assert_eq!(clean_vendor_name("switch ltd").as_deref(), Some("Switch Ltd."));
        assert_eq!(clean_vendor_name("SWITCH LTD").as_deref(), Some("Switch Ltd."));
        assert_eq!(clean_vendor_name("switch inc").as_deref(), Some("Switch Inc."));
        assert_eq!(
            clean_vendor_name("acme corporation").as_deref(),
            Some("Acme Corporation")
        );
    }

    #[test]
    fn comma_before_suffix_is_preserved() {
        assert_eq!(
            clean_vendor_name("Switch, Ltd.").as_deref(),
            Some("Switch, Ltd.")
        );
    }

    #[test]
    fn domain_mapping_short_circuits() {
        assert_eq!(
            clean_vendor_name("billing@fb.com").as_deref(),
            Some("Facebook, Inc.")
        );
        assert_eq!(
            clean_vendor_name("google.com payments").as_deref(),
            Some("Google LLC")
        );
        assert_eq!(
            clean_vendor_name("amazon.com").as_deref(),
            Some("Amazon.com, Inc.")
        );
        assert_eq!(clean_vendor_name("apple.com").as_deref(), Some("Apple Inc."));
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(
            clean_vendor_name("  Tech   Solutions   inc ").as_deref(),
            Some("Tech Solutions Inc.")
        );
    }

    #[test]
    fn empty_input() {
        assert_eq!(clean_vendor_name(""), None);
        assert_eq!(clean_vendor_name("   "), None);
    }

    #[test]
    fn company_name_strips_labels_and_punctuation() {
        assert_eq!(
            clean_company_name("Bill To: Customer Corp").as_deref(),
            Some("Customer Corp")
        );
        assert_eq!(
            clean_company_name("XYZ Industries,").as_deref(),
            Some("XYZ Industries")
        );
    }

    #[test]
    fn company_name_rejects_bad_shapes() {
        assert_eq!(clean_company_name("ab"), None);
        assert_eq!(clean_company_name("123 Main Street"), None);
        let long = "x".repeat(120);
        assert_eq!(clean_company_name(&long), None);
    }
}
