//! Attaches derived color and value to every region the geometry knows.
//!
//! Geometry is authoritative for what exists on the map: attribute rows
//! without a matching feature are dropped here, features without rows get a
//! null value and a transparent fill.

use std::collections::HashMap;

use crate::aggregate::AggregateResult;
use crate::color::{Color, ColorScaleSpec};
use crate::index::RegionIndex;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionBinding {
    pub color: Color,
    pub value: Option<f64>,
}

/// Fully recomputed on every selection change; callers must not serve a
/// binding computed against a previous selection.
pub fn bind(
    index: &RegionIndex,
    aggregate: &AggregateResult,
    scale: &ColorScaleSpec,
) -> HashMap<String, RegionBinding> {
    index
        .all_keys()
        .map(|key| {
            let value = aggregate.get(key).and_then(|entry| entry.percentage);
            let binding = RegionBinding { color: scale.evaluate(value), value };
            (key.to_string(), binding)
        })
        .collect()
}
