//! Per-region aggregation of the measure column over a category selection.
//!
//! The percentage denominator is the all-categories total for the region,
//! not the selected-subset sum: the map answers "what share of all activity
//! do the selected categories make up".

use std::collections::HashMap;

use thiserror::Error;

use crate::types::{AttributeRow, CategorySelection};

/// A negative measure is a data-integrity violation; the whole aggregation
/// call is rejected and the caller keeps its previous result.
#[derive(Debug, Error)]
#[error(
    "negative measure {measure} for region {region_key:?}, category {category:?}"
)]
pub struct InvalidMeasureError {
    pub region_key: String,
    pub category: String,
    pub measure: f64,
}

/// Aggregate for one region. `percentage` is `None` when the region has no
/// usable denominator (rows exist but sum to zero); a region with no rows at
/// all simply has no entry in the result.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegionAggregate {
    pub selected_measure: f64,
    pub total_measure: f64,
    pub percentage: Option<f64>,
}

/// Recomputed in full on every selection change, never patched in place.
pub type AggregateResult = HashMap<String, RegionAggregate>;

pub fn aggregate(
    rows: &[AttributeRow],
    selected: &CategorySelection,
) -> Result<AggregateResult, InvalidMeasureError> {
    let mut result: AggregateResult = HashMap::new();

    for row in rows {
        if row.measure < 0.0 {
            return Err(InvalidMeasureError {
                region_key: row.region_key.clone(),
                category: row.category.clone(),
                measure: row.measure,
            });
        }
        let entry = result.entry(row.region_key.clone()).or_default();
        entry.total_measure += row.measure;
        if selected.contains(&row.category) {
            entry.selected_measure += row.measure;
        }
    }

    for entry in result.values_mut() {
        entry.percentage = if selected.is_empty() {
            // Nothing selected is a real state: 0% everywhere there is data.
            Some(0.0)
        } else if entry.total_measure > 0.0 {
            Some(entry.selected_measure / entry.total_measure * 100.0)
        } else {
            None
        };
    }

    Ok(result)
}
