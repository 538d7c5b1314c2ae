//! Alphabetical grouping of contact records into index sections.
//!
//! Each record lands in exactly one section, keyed by the uppercased leading
//! letter of the name selected by the sort order. Names without a leading
//! letter go to the fallback section `#`, which always sorts last. Records keep
//! the order the source enumerated them in; sections are not re-sorted.

use std::collections::HashMap;

use serde::Deserialize;

use crate::record::ContactRecord;
use crate::source::{is_included, InclusionPredicate};

/// Section key for names with no usable leading letter.
pub const FALLBACK_KEY: &str = "#";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Whatever the contact store reports as the user's preference.
    #[default]
    #[serde(alias = "default")]
    SystemDefault,
    #[serde(alias = "given")]
    GivenName,
    #[serde(alias = "family")]
    FamilyName,
}

impl SortOrder {
    /// Replace `SystemDefault` with the store's preference. A preference that
    /// is itself `SystemDefault` falls back to given name.
    pub fn resolve(self, system_default: SortOrder) -> SortOrder {
        match self {
            SortOrder::SystemDefault => match system_default {
                SortOrder::FamilyName => SortOrder::FamilyName,
                _ => SortOrder::GivenName,
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectoryIndex {
    keys: Vec<String>,
    sections: HashMap<String, Vec<ContactRecord>>,
}

impl DirectoryIndex {
    /// Group `records` under section keys.
    ///
    /// `order` must already be resolved; `SystemDefault` is treated as given
    /// name. Records rejected by `include` are dropped before indexing.
    pub fn build<I>(records: I, order: SortOrder, include: Option<&InclusionPredicate>) -> Self
    where
        I: IntoIterator<Item = ContactRecord>,
    {
        let mut sections: HashMap<String, Vec<ContactRecord>> = HashMap::new();

        for record in records {
            if !is_included(include, &record) {
                continue;
            }
            let key = section_key(&record, order);
            sections.entry(key).or_default().push(record);
        }

        let mut keys: Vec<String> = sections.keys().cloned().collect();
        keys.sort();
        if let Some(pos) = keys.iter().position(|key| key == FALLBACK_KEY) {
            let fallback = keys.remove(pos);
            keys.push(fallback);
        }

        Self { keys, sections }
    }

    /// Section keys, ascending by code point with `#` last.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn section(&self, key: &str) -> Option<&[ContactRecord]> {
        self.sections.get(key).map(Vec::as_slice)
    }

    /// Records of the section at `position` in [`keys`](Self::keys).
    pub fn section_at(&self, position: usize) -> Option<&[ContactRecord]> {
        self.keys.get(position).and_then(|key| self.section(key))
    }

    pub fn position_of(&self, key: &str) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of indexed records across all sections.
    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }

    /// Records in display order: sections in key order, each in source order.
    pub fn iter(&self) -> impl Iterator<Item = &ContactRecord> {
        self.keys
            .iter()
            .filter_map(|key| self.sections.get(key))
            .flat_map(|records| records.iter())
    }
}

/// Key for `record` under `order`: the uppercased leading character of the
/// family name for `FamilyName`, otherwise of the given name, or `#` when that
/// character is missing or not a letter.
pub fn section_key(record: &ContactRecord, order: SortOrder) -> String {
    let name = match order {
        SortOrder::FamilyName => record.family_name(),
        SortOrder::GivenName | SortOrder::SystemDefault => record.given_name(),
    };
    match name.chars().next() {
        Some(first) if first.is_alphabetic() => {
            let mut upper = first.to_uppercase();
            match (upper.next(), upper.next()) {
                (Some(single), None) => single.to_string(),
                // "ß" uppercases to "SS"; keep the letter itself as the key.
                _ => first.to_string(),
            }
        }
        _ => FALLBACK_KEY.to_string(),
    }
}
