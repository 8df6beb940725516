//! Explicit per-session state: the one place that composes index,
//! aggregation, scale, and bindings.
//!
//! The presentation layer owns a `MapSession` and mutates it only through
//! the methods here. Every selection change recomputes the whole derived
//! chain; a failed recomputation leaves the previous state serving, so the
//! caller can keep showing the last good map.

use std::collections::{BTreeSet, HashMap};

use crate::aggregate::{aggregate, AggregateResult, InvalidMeasureError};
use crate::binding::{bind, RegionBinding};
use crate::breakdown::{breakdown, BreakdownRow, CategoryFilter};
use crate::color::{Color, ColorScaleSpec};
use crate::index::{KeyCollisionError, RegionIndex};
use crate::types::{AttributeRow, CategorySelection, RegionFeature};

#[derive(Debug)]
pub struct MapSession {
    index: RegionIndex,
    rows: Vec<AttributeRow>,
    palette: Vec<Color>,
    selection: CategorySelection,
    aggregate: AggregateResult,
    scale: ColorScaleSpec,
    bindings: HashMap<String, RegionBinding>,
}

impl MapSession {
    pub fn new(
        index: RegionIndex,
        rows: Vec<AttributeRow>,
        palette: Vec<Color>,
        selection: CategorySelection,
    ) -> Result<Self, InvalidMeasureError> {
        let mut session = MapSession {
            index,
            rows,
            scale: ColorScaleSpec::build(std::iter::empty(), palette.clone()),
            palette,
            selection: CategorySelection::new(),
            aggregate: AggregateResult::new(),
            bindings: HashMap::new(),
        };
        session.set_selection(selection)?;
        Ok(session)
    }

    /// Swaps the selection and rebuilds aggregate, scale, and bindings. On
    /// error nothing is replaced.
    pub fn set_selection(
        &mut self,
        selection: CategorySelection,
    ) -> Result<(), InvalidMeasureError> {
        let aggregate = aggregate(&self.rows, &selection)?;
        let scale = ColorScaleSpec::build(
            aggregate.values().filter_map(|entry| entry.percentage),
            self.palette.clone(),
        );
        let bindings = bind(&self.index, &aggregate, &scale);

        self.selection = selection;
        self.aggregate = aggregate;
        self.scale = scale;
        self.bindings = bindings;
        Ok(())
    }

    /// Replaces the geometry dataset wholesale (year/geography switch) and
    /// rebinds against the current aggregation. A collision leaves the old
    /// index in place.
    pub fn replace_geometry(
        &mut self,
        features: Vec<RegionFeature>,
    ) -> Result<(), KeyCollisionError> {
        let index = RegionIndex::build(features)?;
        self.index = index;
        self.bindings = bind(&self.index, &self.aggregate, &self.scale);
        Ok(())
    }

    /// Breakdown for one region, independent of the selected aggregation.
    pub fn breakdown(&self, region_key: &str, filter: &CategoryFilter) -> Vec<BreakdownRow> {
        breakdown(&self.rows, region_key, filter)
    }

    /// Every category present anywhere in the attribute table.
    pub fn categories(&self) -> BTreeSet<String> {
        self.rows.iter().map(|row| row.category.clone()).collect()
    }

    pub fn index(&self) -> &RegionIndex {
        &self.index
    }

    pub fn selection(&self) -> &CategorySelection {
        &self.selection
    }

    pub fn scale(&self) -> &ColorScaleSpec {
        &self.scale
    }

    pub fn bindings(&self) -> &HashMap<String, RegionBinding> {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::selection_from;

    fn feature(key: &str) -> RegionFeature {
        RegionFeature {
            region_key: key.to_string(),
            display_name: key.to_string(),
            geometry: geo::MultiPolygon(vec![]),
            extra_properties: serde_json::Map::new(),
        }
    }

    fn row(key: &str, category: &str, measure: f64) -> AttributeRow {
        AttributeRow {
            region_key: key.to_string(),
            category: category.to_string(),
            measure,
        }
    }

    fn palette() -> Vec<Color> {
        vec![Color::rgb(0, 0, 0), Color::rgb(255, 255, 255)]
    }

    fn session() -> MapSession {
        let index = RegionIndex::build(vec![feature("A"), feature("B")]).unwrap();
        let rows = vec![row("A", "car", 80.0), row("A", "bus", 20.0), row("B", "car", 50.0)];
        MapSession::new(index, rows, palette(), selection_from(["car"])).unwrap()
    }

    #[test]
    fn selection_change_recomputes_bindings() {
        let mut s = session();
        assert_eq!(s.bindings()["A"].value, Some(80.0));

        s.set_selection(selection_from(["bus"])).unwrap();
        assert_eq!(s.bindings()["A"].value, Some(20.0));
        assert_eq!(s.bindings()["B"].value, Some(0.0));
    }

    #[test]
    fn failed_selection_keeps_last_good_state() {
        let index = RegionIndex::build(vec![feature("A")]).unwrap();
        let rows = vec![row("A", "car", 10.0), row("A", "bad", -5.0)];
        // Construction already fails: the bad row poisons any aggregation.
        assert!(MapSession::new(index, rows, palette(), selection_from(["car"])).is_err());

        // With clean rows, a session survives a later failure untouched.
        let mut s = session();
        let before = s.bindings().clone();
        let selection_before = s.selection().clone();
        // Inject a bad row, then attempt a recompute.
        s.rows.push(row("B", "bus", -1.0));
        assert!(s.set_selection(selection_from(["bus"])).is_err());
        assert_eq!(s.bindings(), &before);
        assert_eq!(s.selection(), &selection_before);
    }

    #[test]
    fn geometry_swap_is_atomic() {
        let mut s = session();
        // Collision: index untouched, bindings still cover A and B.
        let err = s.replace_geometry(vec![feature("X"), feature("X")]);
        assert!(err.is_err());
        assert!(s.index().lookup("A").is_some());
        assert_eq!(s.bindings().len(), 2);

        // Valid swap rebinds against the new geometry.
        s.replace_geometry(vec![feature("B"), feature("C")]).unwrap();
        assert!(s.index().lookup("A").is_none());
        assert_eq!(s.bindings()["B"].value, Some(100.0));
        assert_eq!(s.bindings()["C"].value, None);
        assert!(s.bindings()["C"].color.is_transparent());
    }

    #[test]
    fn categories_lists_the_table() {
        let s = session();
        let cats: Vec<_> = s.categories().into_iter().collect();
        assert_eq!(cats, ["bus", "car"]);
    }
}
