use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::color::Color;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub input: InputConfig,
    pub map: MapConfig,
    pub output: OutputConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Geometry dataset, `.geojson`/`.json` or `.shp`.
    pub geometry: PathBuf,
    /// Long-format attribute CSV: one row per region and category.
    pub attributes: PathBuf,
    /// Property holding the region code in the geometry dataset.
    pub join_column_geometry: String,
    /// Column holding the region code in the CSV.
    pub join_column_attributes: String,
    pub category_column: String,
    pub measure_column: String,
    /// Geometry property used as the human-readable region name; falls back
    /// to the join key when absent.
    pub display_name_property: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MapConfig {
    /// Ordered hex color stops, low to high.
    pub palette: Vec<String>,
    /// Categories selected at startup; omit to start with all of them.
    pub default_selection: Option<Vec<String>>,
}

impl MapConfig {
    pub fn palette_colors(&self) -> Result<Vec<Color>> {
        if self.palette.is_empty() {
            return Err(anyhow!("map.palette must list at least one color stop"));
        }
        self.palette
            .iter()
            .map(|hex| Color::from_hex(hex).map_err(Into::into))
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    /// Where `choromap export` writes the styled FeatureCollection.
    pub geojson: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

impl AppConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| "Failed to parse TOML configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
[input]
geometry = "data/zones.geojson"
attributes = "data/journeys.csv"
join_column_geometry = "ZONE_CODE"
join_column_attributes = "zone_code"
category_column = "mode"
measure_column = "journeys"

[map]
palette = ["#FFF5EB", "#FD8D3C", "#7F2704"]
default_selection = ["car", "bus"]

[output]
geojson = "out/map.geojson"

[server]
port = 3000
"##;

    #[test]
    fn parses_sample_config() {
        let config: AppConfig = toml::from_str(SAMPLE).unwrap();
        assert_eq!(config.input.join_column_geometry, "ZONE_CODE");
        assert_eq!(config.input.display_name_property, None);
        assert_eq!(config.map.default_selection.clone().unwrap(), ["car", "bus"]);
        assert_eq!(config.server.port, 3000);
        let palette = config.map.palette_colors().unwrap();
        assert_eq!(palette.len(), 3);
        assert_eq!(palette[1], Color::rgb(0xFD, 0x8D, 0x3C));
    }

    #[test]
    fn empty_palette_is_rejected() {
        let mut config: AppConfig = toml::from_str(SAMPLE).unwrap();
        config.map.palette.clear();
        assert!(config.map.palette_colors().is_err());
    }
}
