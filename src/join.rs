//! Join resolver
//!
//! Left joins from rollup output onto the country reference, and from world
//! geometry onto country counts. Unmatched keys are output, not errors.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::db::CountryRow;
use crate::error::JoinIntegrityWarning;
use crate::geo::WorldGeometry;
use crate::reference::{CountryIndex, CountryReference};
use crate::sink::{Cell, Tabular};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryJoinedRow {
    pub country_code: Option<String>,
    pub iso_a3: Option<String>,
    pub name: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryJoin {
    pub rows: Vec<CountryJoinedRow>,
    pub warnings: Vec<JoinIntegrityWarning>,
}

/// Attach reference data to country counts. One output row per input row,
/// in input order; unmatched codes keep `name: None`.
pub fn join_country(agg: &[CountryRow], reference: &CountryReference) -> CountryJoin {
    let index = CountryIndex::build(reference);

    let rows = agg
        .iter()
        .map(|row| {
            let matched = row.country_code.as_deref().and_then(|code| index.get(code));
            CountryJoinedRow {
                country_code: row.country_code.clone(),
                iso_a3: matched.map(|r| r.iso_a3.clone()),
                name: matched.map(|r| r.name.clone()),
                count: row.count,
            }
        })
        .collect();

    CountryJoin {
        rows,
        warnings: index.warnings().to_vec(),
    }
}

impl Tabular for CountryJoin {
    fn columns(&self) -> Vec<&'static str> {
        vec!["country_code", "iso_a3", "name", "count"]
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        self.rows
            .iter()
            .map(|r| {
                vec![
                    Cell::text_or_null(r.country_code.as_deref()),
                    Cell::text_or_null(r.iso_a3.as_deref()),
                    Cell::text_or_null(r.name.as_deref()),
                    Cell::count(r.count),
                ]
            })
            .collect()
    }
}

/// Request volume for a map region. `Missing` is "no data", not zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "count", rename_all = "snake_case")]
pub enum Volume {
    Observed(u64),
    Missing,
}

impl Volume {
    pub fn count(self) -> Option<u64> {
        match self {
            Self::Observed(count) => Some(count),
            Self::Missing => None,
        }
    }

    pub fn is_missing(self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Power-of-ten bucket for a logarithmic color scale
    pub fn decade(self) -> Option<u32> {
        self.count().map(|c| c.max(1).ilog10())
    }

    pub fn color_class(self) -> String {
        match self.decade() {
            Some(d) => format!("1e{d}"),
            None => "missing".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoJoinedRegion {
    pub iso_a3: String,
    pub name: Option<String>,
    pub volume: Volume,
    pub geometry: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoJoinedResult {
    /// One entry per world region, in world order
    pub regions: Vec<GeoJoinedRegion>,
    /// Country rows that could not be placed on the map
    pub unplaced: Vec<CountryRow>,
    pub warnings: Vec<JoinIntegrityWarning>,
}

/// Color world regions by request volume.
///
/// Country codes resolve to `iso_a3` through the deduplicated reference;
/// codes sharing an `iso_a3` are summed. Every world region appears exactly
/// once, with `Volume::Missing` when nothing mapped to it.
pub fn join_geometry(
    agg: &[CountryRow],
    world: &WorldGeometry,
    reference: &CountryReference,
) -> GeoJoinedResult {
    let index = CountryIndex::build(reference);
    let world_codes: HashSet<String> = world
        .regions()
        .iter()
        .map(|r| r.iso_a3.to_ascii_uppercase())
        .collect();

    let mut totals: HashMap<String, u64> = HashMap::new();
    let mut unplaced = Vec::new();
    for row in agg {
        let iso_a3 = row
            .country_code
            .as_deref()
            .and_then(|code| index.get(code))
            .map(|r| r.iso_a3.to_ascii_uppercase())
            .filter(|a3| world_codes.contains(a3));
        match iso_a3 {
            Some(a3) => *totals.entry(a3).or_default() += row.count,
            None => unplaced.push(row.clone()),
        }
    }
    if !unplaced.is_empty() {
        debug!(
            "{} country rows ({} requests) have no map region",
            unplaced.len(),
            unplaced.iter().map(|r| r.count).sum::<u64>()
        );
    }

    let regions = world
        .regions()
        .iter()
        .map(|region| {
            let volume = totals
                .get(&region.iso_a3.to_ascii_uppercase())
                .map_or(Volume::Missing, |&count| Volume::Observed(count));
            GeoJoinedRegion {
                iso_a3: region.iso_a3.clone(),
                name: region.name.clone(),
                volume,
                geometry: region.geometry(),
            }
        })
        .collect();

    GeoJoinedResult {
        regions,
        unplaced,
        warnings: index.warnings().to_vec(),
    }
}

impl GeoJoinedResult {
    pub fn missing(&self) -> impl Iterator<Item = &GeoJoinedRegion> {
        self.regions.iter().filter(|r| r.volume.is_missing())
    }

    /// GeoJSON for the choropleth. Missing regions carry `"count": null`
    /// and `"color_class": "missing"` so they get their own fill.
    pub fn to_feature_collection(&self) -> Value {
        let features: Vec<Value> = self
            .regions
            .iter()
            .map(|r| {
                json!({
                    "type": "Feature",
                    "properties": {
                        "iso_a3": r.iso_a3,
                        "name": r.name,
                        "count": r.volume.count(),
                        "missing": r.volume.is_missing(),
                        "color_class": r.volume.color_class(),
                    },
                    "geometry": r.geometry,
                })
            })
            .collect();
        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }
}

impl Tabular for GeoJoinedResult {
    fn columns(&self) -> Vec<&'static str> {
        vec!["iso_a3", "name", "count"]
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        self.regions
            .iter()
            .map(|r| {
                let count = match r.volume {
                    Volume::Observed(c) => Cell::count(c),
                    Volume::Missing => Cell::Missing,
                };
                vec![
                    Cell::Text(r.iso_a3.clone()),
                    Cell::text_or_null(r.name.as_deref()),
                    count,
                ]
            })
            .collect()
    }

    fn geojson(&self) -> Option<Value> {
        Some(self.to_feature_collection())
    }
}
