//! Loading and key normalization: the boundary where external datasets are
//! coerced into the engine's canonical form.
//!
//! The recurring join bug this layer exists to prevent is an integer-typed
//! code column meeting a string-typed geometry property ("123456.0" vs
//! "123456"). Every key that enters the engine goes through
//! [`normalize_key`] exactly once, here; the engine itself matches exact
//! strings and never guesses.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufReader;

use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use geo::MultiPolygon;
use geojson::GeoJson;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::AppConfig;
use crate::types::{AttributeRow, RegionFeature};

/// Canonical string form of a region code.
///
/// Trims surrounding whitespace and collapses float-formatted integer codes
/// ("123456.0") to their integer digits. Codes with leading zeros or
/// non-numeric codes pass through untouched.
pub fn normalize_key(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.contains('.') {
        if let Ok(n) = trimmed.parse::<f64>() {
            if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                return format!("{}", n as i64);
            }
        }
    }
    trimmed.to_string()
}

fn json_value_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(normalize_key(s)),
        Value::Number(n) => Some(normalize_key(&n.to_string())),
        _ => None,
    }
}

/// Loads the long-format attribute table: one row per region and category.
pub fn load_attribute_rows(config: &AppConfig) -> Result<Vec<AttributeRow>> {
    let input = &config.input;
    let file = File::open(&input.attributes)
        .with_context(|| format!("Failed to open CSV file: {:?}", input.attributes))?;
    let mut rdr = ReaderBuilder::new().from_reader(file);
    let headers = rdr.headers()?.clone();

    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| anyhow!("Column '{}' not found in CSV", name))
    };
    let key_idx = column(&input.join_column_attributes)?;
    let category_idx = column(&input.category_column)?;
    let measure_idx = column(&input.measure_column)?;

    let mut rows = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let region_key = normalize_key(record.get(key_idx).unwrap_or(""));
        if region_key.is_empty() {
            continue;
        }
        let category = record.get(category_idx).unwrap_or("").trim().to_string();
        let raw_measure = record.get(measure_idx).unwrap_or("").trim();
        let measure: f64 = raw_measure.parse().with_context(|| {
            format!(
                "Bad measure {:?} on CSV row {} (region {})",
                raw_measure,
                line + 2,
                region_key
            )
        })?;
        rows.push(AttributeRow { region_key, category, measure });
    }

    info!(rows = rows.len(), "loaded attribute table");
    Ok(rows)
}

/// Every category name appearing in the table.
pub fn all_categories(rows: &[AttributeRow]) -> BTreeSet<String> {
    rows.iter().map(|row| row.category.clone()).collect()
}

/// Loads the geometry dataset, dispatching on file extension. All polygon
/// features with a usable region code are kept, whether or not the attribute
/// table mentions them: missing joins are a state, not a load error.
pub fn load_region_features(config: &AppConfig) -> Result<Vec<RegionFeature>> {
    let extension = config
        .input
        .geometry
        .extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Input geometry file has no extension"))?;

    let features = match extension.as_str() {
        "shp" => load_shapefile_features(config)?,
        "json" | "geojson" => load_geojson_features(config)?,
        _ => return Err(anyhow!("Unsupported geometry format: {}", extension)),
    };

    info!(features = features.len(), "loaded geometry dataset");
    Ok(features)
}

fn load_geojson_features(config: &AppConfig) -> Result<Vec<RegionFeature>> {
    let input = &config.input;
    let file = File::open(&input.geometry)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", input.geometry))?;
    let reader = BufReader::new(file);

    let geojson = GeoJson::from_reader(reader).context("Failed to parse GeoJSON")?;
    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::new();
    for feature in collection.features {
        let mut props = feature.properties.unwrap_or_default();

        let region_key = match props.get(&input.join_column_geometry).and_then(json_value_key) {
            Some(key) if !key.is_empty() => key,
            _ => continue, // no usable code, nothing to join against
        };

        let display_name = input
            .display_name_property
            .as_ref()
            .and_then(|p| props.get(p))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| region_key.clone());

        let geometry = match feature.geometry {
            Some(geom) => {
                let converted: geo::Geometry<f64> = geom
                    .value
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert geojson geometry: {:?}", e))?;
                match converted {
                    geo::Geometry::MultiPolygon(mp) => mp,
                    geo::Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
                    _ => continue, // skip points/lines
                }
            }
            None => continue,
        };

        props.remove(&input.join_column_geometry);
        if let Some(name_prop) = &input.display_name_property {
            props.remove(name_prop);
        }

        features.push(RegionFeature {
            region_key,
            display_name,
            geometry,
            extra_properties: props,
        });
    }

    Ok(features)
}

fn load_shapefile_features(config: &AppConfig) -> Result<Vec<RegionFeature>> {
    let input = &config.input;
    let mut reader = shapefile::Reader::from_path(&input.geometry)
        .with_context(|| format!("Failed to open Shapefile: {:?}", input.geometry))?;

    let mut features = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;

        let geometry = match shape {
            shapefile::Shape::Polygon(polygon) => {
                let mp: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?;
                mp
            }
            shapefile::Shape::PolygonM(polygon) => {
                let mp: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?;
                mp
            }
            shapefile::Shape::PolygonZ(polygon) => {
                let mp: MultiPolygon<f64> = polygon
                    .try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?;
                mp
            }
            _ => continue, // skip non-polygon shapes
        };

        let mut props = Map::new();
        for (name, field) in record.into_iter() {
            if let Some(value) = dbase_to_json(&field) {
                props.insert(name, value);
            }
        }

        let region_key = match props.get(&input.join_column_geometry).and_then(json_value_key) {
            Some(key) if !key.is_empty() => key,
            _ => continue,
        };

        let display_name = input
            .display_name_property
            .as_ref()
            .and_then(|p| props.get(p))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| region_key.clone());

        props.remove(&input.join_column_geometry);
        if let Some(name_prop) = &input.display_name_property {
            props.remove(name_prop);
        }

        features.push(RegionFeature {
            region_key,
            display_name,
            geometry,
            extra_properties: props,
        });
    }

    Ok(features)
}

fn dbase_to_json(field: &shapefile::dbase::FieldValue) -> Option<Value> {
    use shapefile::dbase::FieldValue;
    match field {
        FieldValue::Character(Some(s)) => Some(Value::String(s.clone())),
        FieldValue::Numeric(Some(n)) => serde_json::Number::from_f64(*n).map(Value::Number),
        FieldValue::Float(Some(f)) => serde_json::Number::from_f64(*f as f64).map(Value::Number),
        FieldValue::Integer(i) => Some(Value::from(*i)),
        FieldValue::Double(d) => serde_json::Number::from_f64(*d).map(Value::Number),
        FieldValue::Logical(Some(b)) => Some(Value::Bool(*b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_collapses_float_codes() {
        assert_eq!(normalize_key(" 123456 "), "123456");
        assert_eq!(normalize_key("123456.0"), "123456");
        assert_eq!(normalize_key("123456.5"), "123456.5");
        // Leading zeros are significant in census codes.
        assert_eq!(normalize_key("017"), "017");
        assert_eq!(normalize_key("SA2017_001"), "SA2017_001");
        assert_eq!(normalize_key(""), "");
    }

    #[test]
    fn json_keys_share_one_canonical_form() {
        let as_string = json_value_key(&Value::String("123456".into())).unwrap();
        let as_int = json_value_key(&Value::from(123456)).unwrap();
        let as_float = json_value_key(&Value::from(123456.0)).unwrap();
        assert_eq!(as_string, as_int);
        assert_eq!(as_string, as_float);
        assert_eq!(json_value_key(&Value::Null), None);
        assert_eq!(json_value_key(&Value::Bool(true)), None);
    }
}
