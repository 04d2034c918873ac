//! Canonical matching keys shared by records and polygons
//!
//! A key is the matching form of a name after it has been folded through the
//! run's name mapping. Record names and polygon names go through the same
//! function, so two names that normalize alike always get the same key.

use crate::polygons::PolygonSet;
use geolink_names::{NameMapping, TextNormalizer};
use std::collections::HashMap;
use tracing::debug;

/// raw name -> canonical name (through the mapping) -> matching key
#[derive(Debug, Clone)]
pub struct CanonicalKeys {
    normalizer: TextNormalizer,
    /// Matching form of each mapped original to the matching form of its
    /// canonical name; the first original in mapping order wins
    folded: HashMap<String, String>,
}

impl CanonicalKeys {
    pub fn new(mapping: &NameMapping) -> Self {
        let normalizer = TextNormalizer::matching();
        let mut folded = HashMap::with_capacity(mapping.len());
        for (original, canonical) in mapping.iter() {
            let original = normalizer.normalize(original);
            if !original.is_empty() {
                folded.entry(original).or_insert_with(|| normalizer.normalize(canonical));
            }
        }
        Self { normalizer, folded }
    }

    pub fn key(&self, raw: &str) -> String {
        let normalized = self.normalizer.normalize(raw);
        match self.folded.get(&normalized) {
            Some(canonical) => canonical.clone(),
            None => normalized,
        }
    }
}

/// Canonical key of every polygon name, for one run's mapping
#[derive(Debug, Clone)]
pub struct PolygonNames {
    keys: Vec<String>,
    by_key: HashMap<String, Vec<usize>>,
}

impl PolygonNames {
    pub fn new(polygons: &PolygonSet, keys: &CanonicalKeys) -> Self {
        let keys: Vec<String> = polygons.iter().map(|p| keys.key(&p.name)).collect();

        let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();
        for (slot, key) in keys.iter().enumerate() {
            if !key.is_empty() {
                by_key.entry(key.clone()).or_default().push(slot);
            }
        }
        let shared = by_key.values().filter(|slots| slots.len() > 1).count();
        if shared > 0 {
            debug!("{} canonical names are shared by several polygons", shared);
        }

        Self { keys, by_key }
    }

    /// Canonical key of a polygon's name
    pub fn key(&self, slot: usize) -> &str {
        &self.keys[slot]
    }

    /// Slots whose canonical key equals `key`, ascending
    pub fn slots_with_key(&self, key: &str) -> &[usize] {
        self.by_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::polygons::tests::square_polygon;

    fn sample_set() -> PolygonSet {
        PolygonSet::new(vec![
            square_polygon("B", "Las Quintas", -110.95, 29.08, 0.01),
            square_polygon("A", "Centro", -110.96, 29.08, 0.01),
            square_polygon("C", "centro ", -110.90, 29.00, 0.01),
        ])
        .unwrap()
    }

    #[test]
    fn test_keys_without_mapping_are_normalized() {
        let set = sample_set();
        let names = PolygonNames::new(&set, &CanonicalKeys::new(&NameMapping::new()));
        assert_eq!(names.key(1), "LAS QUINTAS");
        assert_eq!(names.slots_with_key("CENTRO"), &[0, 2]);
        assert!(names.slots_with_key("PITIC").is_empty());
    }

    #[test]
    fn test_mapping_folds_any_spelling_of_an_original() {
        let mapping = NameMapping::from_pairs([("Villa Satelites", "VILLA SATELITE")]);
        let keys = CanonicalKeys::new(&mapping);
        assert_eq!(keys.key("Villa Satelites"), "VILLA SATELITE");
        assert_eq!(keys.key("  VILLA SATÉLITES "), "VILLA SATELITE");
        assert_eq!(keys.key("Villa Satelite"), "VILLA SATELITE");
        assert_eq!(keys.key("Pitic"), "PITIC");
        assert_eq!(keys.key(""), "");
    }

    #[test]
    fn test_polygon_names_go_through_the_mapping() {
        let set = PolygonSet::new(vec![
            square_polygon("P1", "Villa Satelite", -110.96, 29.08, 0.01),
            square_polygon("P2", "Villa Satelites", -110.95, 29.08, 0.01),
        ])
        .unwrap();
        let mapping = NameMapping::from_pairs([
            ("VILLA SATELITE", "VILLA SATELITE"),
            ("Villa Satelites", "VILLA SATELITE"),
        ]);
        let keys = CanonicalKeys::new(&mapping);
        let names = PolygonNames::new(&set, &keys);
        assert_eq!(names.key(1), keys.key("Villa Satelites"));
        assert_eq!(names.slots_with_key("VILLA SATELITE"), &[0, 1]);
    }
}
