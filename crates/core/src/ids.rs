//! Identifier classification for logistics tracking codes.
//!
//! Every code class is a fixed prefix followed by uppercase alphanumerics,
//! some with an exact length. Input is normalized to uppercase before
//! validation, so the validators only accept the canonical form.

/// The class of a tracking identifier, by prefix pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdClass {
    /// Shipment number: `BR` + 13 alphanumerics.
    Shipment,
    /// Legacy shipment number: `SPX` + alphanumerics.
    LegacyShipment,
    /// Transfer order: `TO` + alphanumerics.
    TransferOrder,
    /// Validation (audit) task: `VT` + 13 alphanumerics.
    ValidationTask,
    /// Pick sheet: `PS` + alphanumerics.
    PickSheet,
    /// Assignment target: `AT` + alphanumerics.
    AssignmentTarget,
}

fn tail_is_alnum_upper(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}

fn matches_prefix(code: &str, prefix: &str, exact_tail: Option<usize>) -> bool {
    match code.strip_prefix(prefix) {
        Some(tail) => {
            tail_is_alnum_upper(tail) && exact_tail.map_or(true, |n| tail.len() == n)
        }
        None => false,
    }
}

impl IdClass {
    /// Whether `code` (already uppercased) is a valid member of this class.
    pub fn matches(self, code: &str) -> bool {
        match self {
            IdClass::Shipment => matches_prefix(code, "BR", Some(13)),
            IdClass::LegacyShipment => matches_prefix(code, "SPX", None),
            IdClass::TransferOrder => matches_prefix(code, "TO", None),
            IdClass::ValidationTask => matches_prefix(code, "VT", Some(13)),
            IdClass::PickSheet => matches_prefix(code, "PS", None),
            IdClass::AssignmentTarget => matches_prefix(code, "AT", None),
        }
    }
}

/// Split raw pasted text into candidate codes: whitespace/comma/semicolon
/// separated, trimmed, uppercased, empties dropped.
pub fn parse_codes(raw: &str) -> Vec<String> {
    raw.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Deduplicate, preserving first-occurrence order. Input is expected to be
/// uppercased already, making the dedup effectively case-insensitive.
pub fn dedup_preserving_order(codes: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    codes.into_iter().filter(|c| seen.insert(c.clone())).collect()
}

/// Parse, filter to one class, and dedup in a single step.
pub fn classify(raw: &str, class: IdClass) -> Vec<String> {
    dedup_preserving_order(
        parse_codes(raw)
            .into_iter()
            .filter(|c| class.matches(c))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipment_pattern_requires_13_tail_chars() {
        assert!(IdClass::Shipment.matches("BR1234567890123"));
        assert!(!IdClass::Shipment.matches("BR123"));
        assert!(!IdClass::Shipment.matches("BR12345678901234"));
        assert!(!IdClass::Shipment.matches("XX1234567890123"));
    }

    #[test]
    fn validation_task_pattern() {
        assert!(IdClass::ValidationTask.matches("VT2024AB1234567"));
        assert!(!IdClass::ValidationTask.matches("VT2024"));
        // lowercase is rejected — normalization happens upstream
        assert!(!IdClass::ValidationTask.matches("vt2024ab1234567"));
    }

    #[test]
    fn variable_length_classes() {
        assert!(IdClass::TransferOrder.matches("TO1"));
        assert!(IdClass::AssignmentTarget.matches("AT123456"));
        assert!(IdClass::LegacyShipment.matches("SPXBR123"));
        assert!(!IdClass::TransferOrder.matches("TO"));
    }

    #[test]
    fn parse_splits_and_uppercases() {
        let codes = parse_codes("vt111, to222;\n br333\tex444  ");
        assert_eq!(codes, vec!["VT111", "TO222", "BR333", "EX444"]);
    }

    #[test]
    fn classify_dedups_case_insensitively_preserving_order() {
        let tasks = classify("VT1234567890123\nvt1234567890123 VT9999999999999", IdClass::ValidationTask);
        assert_eq!(tasks, vec!["VT1234567890123", "VT9999999999999"]);
    }
}
