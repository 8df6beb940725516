//! Per-region category breakdown, independent of the current map state.
//!
//! Shares here are relative to the filtered subtotal, not the all-categories
//! total the map uses: the table answers "how do the categories I picked
//! split up within this region".

use std::cmp::Ordering;

use crate::types::{AttributeRow, CategorySelection};

/// Which categories the breakdown covers.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryFilter {
    All,
    Subset(CategorySelection),
}

impl CategoryFilter {
    fn matches(&self, category: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Subset(selection) => selection.contains(category),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BreakdownRow {
    pub category: String,
    pub measure: f64,
    /// Percent of the filtered subtotal; 0 when that subtotal is 0.
    pub share_of_filtered_total: f64,
}

/// Filters `rows` to one region (and optionally a category subset) and
/// returns the rows largest-first, ties broken by category name.
pub fn breakdown(
    rows: &[AttributeRow],
    region_key: &str,
    filter: &CategoryFilter,
) -> Vec<BreakdownRow> {
    let filtered: Vec<&AttributeRow> = rows
        .iter()
        .filter(|row| row.region_key == region_key && filter.matches(&row.category))
        .collect();

    let total: f64 = filtered.iter().map(|row| row.measure).sum();

    let mut out: Vec<BreakdownRow> = filtered
        .into_iter()
        .map(|row| BreakdownRow {
            category: row.category.clone(),
            measure: row.measure,
            share_of_filtered_total: if total > 0.0 {
                row.measure / total * 100.0
            } else {
                0.0
            },
        })
        .collect();

    out.sort_by(|a, b| {
        b.measure
            .partial_cmp(&a.measure)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.category.cmp(&b.category))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::selection_from;

    fn row(key: &str, category: &str, measure: f64) -> AttributeRow {
        AttributeRow {
            region_key: key.to_string(),
            category: category.to_string(),
            measure,
        }
    }

    fn sample_rows() -> Vec<AttributeRow> {
        vec![
            row("A", "car", 80.0),
            row("A", "bus", 20.0),
            row("B", "car", 50.0),
        ]
    }

    #[test]
    fn all_categories_descending() {
        let table = breakdown(&sample_rows(), "A", &CategoryFilter::All);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].category, "car");
        assert_eq!(table[0].measure, 80.0);
        assert_eq!(table[0].share_of_filtered_total, 80.0);
        assert_eq!(table[1].category, "bus");
        assert_eq!(table[1].share_of_filtered_total, 20.0);
    }

    #[test]
    fn measures_are_conserved() {
        let rows = sample_rows();
        let table = breakdown(&rows, "A", &CategoryFilter::All);
        let table_sum: f64 = table.iter().map(|r| r.measure).sum();
        let row_sum: f64 = rows
            .iter()
            .filter(|r| r.region_key == "A")
            .map(|r| r.measure)
            .sum();
        assert_eq!(table_sum, row_sum);
    }

    #[test]
    fn subset_filter_changes_denominator() {
        let table = breakdown(
            &sample_rows(),
            "A",
            &CategoryFilter::Subset(selection_from(["bus"])),
        );
        assert_eq!(table.len(), 1);
        assert_eq!(table[0].category, "bus");
        // 100% of the filtered subtotal, even though bus is 20% of the region.
        assert_eq!(table[0].share_of_filtered_total, 100.0);
    }

    #[test]
    fn zero_filtered_total_means_zero_shares() {
        let rows = vec![row("A", "car", 0.0), row("A", "bus", 0.0)];
        let table = breakdown(&rows, "A", &CategoryFilter::All);
        assert_eq!(table.len(), 2);
        for entry in &table {
            assert_eq!(entry.share_of_filtered_total, 0.0);
        }
    }

    #[test]
    fn unknown_region_is_empty() {
        assert!(breakdown(&sample_rows(), "Z", &CategoryFilter::All).is_empty());
    }

    #[test]
    fn ties_break_by_category_name() {
        let rows = vec![row("A", "walk", 10.0), row("A", "bike", 10.0)];
        let table = breakdown(&rows, "A", &CategoryFilter::All);
        assert_eq!(table[0].category, "bike");
        assert_eq!(table[1].category, "walk");
    }
}
