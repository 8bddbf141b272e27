//! World geometry for the choropleth
//!
//! Reads a GeoJSON FeatureCollection (Natural Earth style) and keys each
//! feature by its 3-letter ISO code, uppercased. Features that share a code
//! are merged into one region so every code appears once.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::GeoConfig;
use crate::error::{ReportError, Result};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    kind: String,
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    geometry: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub iso_a3: String,
    pub name: Option<String>,
    pub geometries: Vec<Value>,
}

impl Region {
    /// A single GeoJSON geometry for this region
    pub fn geometry(&self) -> Value {
        match self.geometries.as_slice() {
            [single] => single.clone(),
            many => serde_json::json!({
                "type": "GeometryCollection",
                "geometries": many,
            }),
        }
    }
}

/// Regions in source order, one per ISO alpha-3 code
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldGeometry {
    regions: Vec<Region>,
}

impl WorldGeometry {
    pub fn load(path: impl AsRef<Path>, config: &GeoConfig) -> Result<Self> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        let raw = fs::read_to_string(path)
            .map_err(|e| ReportError::data_format(&source_name, format!("cannot read: {e}")))?;
        let world = Self::parse(&raw, config, &source_name)?;
        info!("Loaded {} world regions from {}", world.len(), source_name);
        Ok(world)
    }

    pub fn from_geojson(raw: &str, config: &GeoConfig) -> Result<Self> {
        Self::parse(raw, config, "world geometry")
    }

    /// Build from already keyed regions, merging any that share a code
    pub fn from_regions(regions: Vec<Region>) -> Self {
        let mut set = RegionSet::default();
        for region in regions {
            set.add(region);
        }
        Self {
            regions: set.regions,
        }
    }

    fn parse(raw: &str, config: &GeoConfig, source_name: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(raw)
            .map_err(|e| ReportError::data_format(source_name, e.to_string()))?;
        if collection.kind != "FeatureCollection" {
            return Err(ReportError::data_format(
                source_name,
                format!("expected a FeatureCollection, found {}", collection.kind),
            ));
        }

        let upper_key = config.key_property.to_ascii_uppercase();
        let mut set = RegionSet::default();

        for (i, feature) in collection.features.into_iter().enumerate() {
            let properties = feature.properties.unwrap_or_default();
            let code = properties
                .get(&config.key_property)
                .or_else(|| properties.get(&upper_key))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|c| !c.is_empty());
            let Some(code) = code else {
                debug!("Skipping feature {} without '{}'", i, config.key_property);
                continue;
            };
            let Some(geometry) = feature.geometry else {
                warn!("Feature {} ({}) has no geometry and will not be mapped", i, code);
                continue;
            };

            set.add(Region {
                iso_a3: code.to_string(),
                name: property_name(&properties),
                geometries: vec![geometry],
            });
        }

        if set.regions.is_empty() {
            return Err(ReportError::data_format(
                source_name,
                format!("no features carry a '{}' property", config.key_property),
            ));
        }

        Ok(Self {
            regions: set.regions,
        })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// Regions in insertion order, keyed by uppercased code
#[derive(Default)]
struct RegionSet {
    regions: Vec<Region>,
    by_code: HashMap<String, usize>,
}

impl RegionSet {
    fn add(&mut self, region: Region) {
        let key = region.iso_a3.trim().to_ascii_uppercase();
        match self.by_code.get(&key).copied() {
            Some(idx) => self.regions[idx].geometries.extend(region.geometries),
            None => {
                self.by_code.insert(key.clone(), self.regions.len());
                self.regions.push(Region {
                    iso_a3: key,
                    ..region
                });
            }
        }
    }
}

fn property_name(properties: &Map<String, Value>) -> Option<String> {
    ["name", "NAME", "admin", "ADMIN"]
        .iter()
        .find_map(|k| properties.get(*k).and_then(Value::as_str))
        .map(str::to_string)
}
