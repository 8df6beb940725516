//! Writes the joined, styled dataset back out as GeoJSON.
//!
//! One feature per indexed region, carrying the derived `aggregate_value`
//! and `display_color` properties next to whatever the source feature
//! already had. The output is plain data for any renderer; no map or tile
//! logic lives here.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use geojson::{Feature, FeatureCollection, Geometry};
use serde_json::{Map, Value};
use tracing::info;

use crate::session::MapSession;

/// Builds the styled FeatureCollection. Features are ordered by region key
/// so repeated exports of the same state are byte-identical.
pub fn feature_collection(session: &MapSession) -> FeatureCollection {
    let mut keys: Vec<&str> = session.index().all_keys().collect();
    keys.sort_unstable();

    let features = keys
        .into_iter()
        .filter_map(|key| {
            let region = session.index().lookup(key)?;
            let binding = session.bindings().get(key)?;

            let mut properties = region.extra_properties.clone();
            properties.insert("region_key".to_string(), Value::from(key));
            properties.insert(
                "display_name".to_string(),
                Value::from(region.display_name.clone()),
            );
            properties.insert(
                "aggregate_value".to_string(),
                binding.value.map(Value::from).unwrap_or(Value::Null),
            );
            properties.insert(
                "display_color".to_string(),
                binding.color.to_hex().map(Value::from).unwrap_or(Value::Null),
            );

            Some(feature_with(region, properties))
        })
        .collect();

    FeatureCollection { bbox: None, features, foreign_members: None }
}

fn feature_with(
    region: &crate::types::RegionFeature,
    properties: Map<String, Value>,
) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geojson::Value::from(&region.geometry))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn write_geojson(session: &MapSession, path: &Path) -> Result<()> {
    let collection = feature_collection(session);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
        }
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create output file: {:?}", path))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, &collection)
        .context("Failed to serialize FeatureCollection")?;
    writer.flush().context("Failed to flush output file")?;

    info!(features = collection.features.len(), path = ?path, "wrote styled GeoJSON");
    Ok(())
}
