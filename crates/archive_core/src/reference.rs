use std::collections::HashMap;

use serde::Serialize;

use crate::ordinal::OrdinalKey;

/// One footnote-style citation lifted out of document markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceEntry {
    pub ordinal: String,
    pub text: String,
    pub resolved_url: String,
}

impl ReferenceEntry {
    pub fn new(
        ordinal: impl Into<String>,
        text: impl Into<String>,
        resolved_url: impl Into<String>,
    ) -> Self {
        Self {
            ordinal: ordinal.into(),
            text: text.into(),
            resolved_url: resolved_url.into(),
        }
    }

    pub fn sort_key(&self) -> OrdinalKey {
        OrdinalKey::parse(&self.ordinal)
    }
}

/// Collects references keyed by ordinal.
///
/// A repeated ordinal replaces the earlier entry (last write wins). Whether a
/// document may legitimately repeat a footnote number is not settled; this
/// collapsing is implementation-defined.
#[derive(Debug, Default, Clone)]
pub struct ReferenceCollector {
    entries: HashMap<String, ReferenceEntry>,
}

impl ReferenceCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry that was replaced, if the ordinal was already present.
    pub fn insert(&mut self, entry: ReferenceEntry) -> Option<ReferenceEntry> {
        self.entries.insert(entry.ordinal.clone(), entry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by ordinal read as an integer.
    pub fn into_sorted(self) -> Vec<ReferenceEntry> {
        let mut entries: Vec<ReferenceEntry> = self.entries.into_values().collect();
        entries.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| a.ordinal.cmp(&b.ordinal))
        });
        entries
    }
}
