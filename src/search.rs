//! Query normalization and the name match shared by the bundled sources.
//!
//! Text is folded to lowercase ASCII with deunicode, so "José" and "Иван"
//! can be found from a Latin keyboard.

use deunicode::deunicode;

use crate::record::ContactRecord;

/// Fold `s` to lowercase Latin with runs of whitespace collapsed.
pub fn normalize(s: &str) -> String {
    let folded = deunicode(s).to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `None` for a blank query, which means "no filter active".
pub fn normalize_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(normalize(trimmed))
    }
}

/// Name match used by the bundled sources: the normalized query must occur in
/// the given name, family name, full display name or organization.
pub fn record_matches(record: &ContactRecord, normalized_query: &str) -> bool {
    let display = record.display_name();
    [
        record.given_name(),
        record.family_name(),
        display.as_str(),
        record.organization(),
    ]
    .iter()
    .any(|candidate| !candidate.is_empty() && normalize(candidate).contains(normalized_query))
}
