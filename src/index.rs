//! Lookup from canonical region key to geometry feature.
//!
//! Built once per geometry dataset and immutable afterwards; a dataset
//! switch is a wholesale rebuild. Key matching is exact string equality,
//! the loader is responsible for normalizing keys beforehand.

use std::collections::{hash_map::Entry, HashMap};

use thiserror::Error;

use crate::types::RegionFeature;

/// Two features in one geometry dataset resolved to the same key. That is
/// ambiguous input, not something to overwrite silently.
#[derive(Debug, Error)]
#[error("duplicate region key {key:?} in geometry input")]
pub struct KeyCollisionError {
    pub key: String,
}

#[derive(Debug, Clone, Default)]
pub struct RegionIndex {
    features: HashMap<String, RegionFeature>,
}

impl RegionIndex {
    pub fn build(
        features: impl IntoIterator<Item = RegionFeature>,
    ) -> Result<Self, KeyCollisionError> {
        let mut map = HashMap::new();
        for feature in features {
            match map.entry(feature.region_key.clone()) {
                Entry::Occupied(_) => {
                    return Err(KeyCollisionError { key: feature.region_key });
                }
                Entry::Vacant(slot) => {
                    slot.insert(feature);
                }
            }
        }
        Ok(RegionIndex { features: map })
    }

    pub fn lookup(&self, region_key: &str) -> Option<&RegionFeature> {
        self.features.get(region_key)
    }

    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        self.features.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionFeature> {
        self.features.values()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feature(key: &str) -> RegionFeature {
        RegionFeature {
            region_key: key.to_string(),
            display_name: format!("Region {key}"),
            geometry: geo::MultiPolygon(vec![]),
            extra_properties: serde_json::Map::new(),
        }
    }

    #[test]
    fn build_and_lookup() {
        let index = RegionIndex::build(vec![feature("A"), feature("B")]).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("A").unwrap().display_name, "Region A");
        assert_eq!(index.lookup("B").unwrap().region_key, "B");
        assert!(index.lookup("C").is_none());
        let mut keys: Vec<_> = index.all_keys().collect();
        keys.sort();
        assert_eq!(keys, ["A", "B"]);
    }

    #[test]
    fn duplicate_key_is_a_collision() {
        let err = RegionIndex::build(vec![feature("A"), feature("A")]).unwrap_err();
        assert_eq!(err.key, "A");
    }

    #[test]
    fn keys_match_exactly() {
        let index = RegionIndex::build(vec![feature("017")]).unwrap();
        assert!(index.lookup("017").is_some());
        assert!(index.lookup("17").is_none());
        assert!(index.lookup("017 ").is_none());
    }
}
