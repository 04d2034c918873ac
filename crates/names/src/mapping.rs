//! Raw-name to canonical-name mapping

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Write-once mapping from every raw name seen to its canonical name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameMapping {
    entries: BTreeMap<String, String>,
}

impl NameMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(original, canonical)` pairs; a repeated original keeps
    /// its first canonical name.
    pub fn from_pairs<I, A, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let mut mapping = Self::new();
        for (original, canonical) in pairs {
            mapping.insert(original, canonical);
        }
        mapping
    }

    /// Record a mapping. Returns `false` and keeps the existing entry if
    /// `original` is already mapped.
    pub fn insert(&mut self, original: impl Into<String>, canonical: impl Into<String>) -> bool {
        match self.entries.entry(original.into()) {
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(canonical.into());
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Canonical name for a raw name, if mapped
    pub fn canonical_for(&self, original: &str) -> Option<&str> {
        self.entries.get(original).map(String::as_str)
    }

    /// Canonical name for a raw name, or the raw name itself when unmapped
    pub fn resolve<'a>(&'a self, original: &'a str) -> &'a str {
        self.canonical_for(original).unwrap_or(original)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct canonical names
    pub fn canonical_count(&self) -> usize {
        self.entries.values().collect::<BTreeSet<_>>().len()
    }

    /// Iterate `(original, canonical)` pairs in original-name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_falls_back_to_original() {
        let mapping = NameMapping::from_pairs([("Centro ", "Centro"), ("CENTRO", "Centro")]);
        assert_eq!(mapping.resolve("Centro "), "Centro");
        assert_eq!(mapping.resolve("Pitic"), "Pitic");
        assert_eq!(mapping.canonical_for("Pitic"), None);
    }

    #[test]
    fn test_insert_is_write_once() {
        let mut mapping = NameMapping::new();
        assert!(mapping.insert("a", "A"));
        assert!(!mapping.insert("a", "B"));
        assert_eq!(mapping.resolve("a"), "A");
        assert_eq!(mapping.len(), 1);
    }

    #[test]
    fn test_canonical_count_and_order() {
        let mapping = NameMapping::from_pairs([("b", "X"), ("a", "X"), ("c", "Y")]);
        assert_eq!(mapping.canonical_count(), 2);
        let originals: Vec<&str> = mapping.iter().map(|(o, _)| o).collect();
        assert_eq!(originals, vec!["a", "b", "c"]);
    }
}
