use std::collections::BTreeSet;

use geo::MultiPolygon;
use serde_json::{Map, Value};

/// One row of the attribute table: a measure recorded for a region under a
/// single category. A region typically contributes one row per category.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRow {
    pub region_key: String,
    pub category: String,
    pub measure: f64,
}

/// A polygon feature from the geometry dataset. `region_key` must already be
/// in canonical string form (see [`crate::data::normalize_key`]); the
/// geometry payload is pass-through data for the rendering layer, the engine
/// never inspects it. `extra_properties` carries whatever else the source
/// feature had; it is opaque to the engine and preserved on export.
#[derive(Debug, Clone)]
pub struct RegionFeature {
    pub region_key: String,
    pub display_name: String,
    pub geometry: MultiPolygon<f64>,
    pub extra_properties: Map<String, Value>,
}

/// The set of categories currently selected by the caller. Order-irrelevant;
/// read-only to the engine.
pub type CategorySelection = BTreeSet<String>;

/// Builds a [`CategorySelection`] from anything yielding category names.
pub fn selection_from<I, S>(categories: I) -> CategorySelection
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    categories.into_iter().map(Into::into).collect()
}
