//! Country reference table
//!
//! Loads the ISO 3166 code table (the widely circulated
//! `countries_codes_and_coordinates.csv` layout) and normalizes it to
//! `country_code`, `iso_a3` and `name`. The published file pads fields with
//! spaces and wraps them in quotes that the CSV reader cannot unwrap, so every
//! header and field is stripped of both.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ReferenceConfig;
use crate::error::{JoinIntegrityWarning, ReportError, Result};

pub const ALPHA2_COLUMN: &str = "Alpha-2 code";
pub const ALPHA3_COLUMN: &str = "Alpha-3 code";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryRecord {
    pub country_code: String,
    pub iso_a3: String,
    pub name: String,
}

/// Normalized reference rows in source order. May still contain duplicate
/// codes; use `deduplicated` or `CountryIndex` before joining.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryReference {
    records: Vec<CountryRecord>,
}

fn clean(field: &str) -> &str {
    field.trim_matches(|c: char| c.is_whitespace() || c == '"')
}

impl CountryReference {
    pub fn load(path: impl AsRef<Path>, config: &ReferenceConfig) -> Result<Self> {
        let path = path.as_ref();
        let source_name = path.display().to_string();
        let file = File::open(path)
            .map_err(|e| ReportError::data_format(&source_name, format!("cannot read: {e}")))?;
        let reference = Self::parse(file, config, &source_name)?;
        info!(
            "Loaded {} country reference rows from {}",
            reference.len(),
            source_name
        );
        Ok(reference)
    }

    pub fn from_reader<R: Read>(reader: R, config: &ReferenceConfig) -> Result<Self> {
        Self::parse(reader, config, "country reference")
    }

    pub fn from_records(records: Vec<CountryRecord>) -> Self {
        Self { records }
    }

    fn parse<R: Read>(reader: R, config: &ReferenceConfig, source_name: &str) -> Result<Self> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv
            .headers()
            .map_err(|e| ReportError::data_format(source_name, e.to_string()))?
            .iter()
            .map(|h| clean(h).to_string())
            .collect();

        let position = |column: &str| {
            headers.iter().position(|h| h == column).ok_or_else(|| {
                ReportError::data_format(source_name, format!("missing column '{column}'"))
            })
        };
        let code_idx = position(ALPHA2_COLUMN)?;
        let a3_idx = position(ALPHA3_COLUMN)?;
        let name_idx = position(clean(&config.name_column))?;

        let mut records = Vec::new();
        for (line, row) in csv.records().enumerate() {
            let row = row.map_err(|e| {
                ReportError::data_format(source_name, format!("row {}: {e}", line + 1))
            })?;
            let field = |idx: usize| row.get(idx).map(clean).unwrap_or_default();

            let country_code = field(code_idx);
            if country_code.is_empty() {
                debug!("Skipping reference row {} without a country code", line + 1);
                continue;
            }
            records.push(CountryRecord {
                country_code: country_code.to_string(),
                iso_a3: field(a3_idx).to_string(),
                name: field(name_idx).to_string(),
            });
        }

        Ok(Self { records })
    }

    pub fn records(&self) -> &[CountryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// One record per country code, first occurrence wins. Codes compare
    /// ASCII case-insensitively. Every code seen more than once yields a warning;
    /// logging it is left to the caller.
    pub fn deduplicated(&self) -> (Vec<&CountryRecord>, Vec<JoinIntegrityWarning>) {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut kept = Vec::with_capacity(self.records.len());
        let mut first_seen_order = Vec::new();

        for record in &self.records {
            let key = record.country_code.to_ascii_uppercase();
            let occurrences = seen.entry(key.clone()).or_insert(0);
            if *occurrences == 0 {
                kept.push(record);
                first_seen_order.push(key);
            }
            *occurrences += 1;
        }

        let warnings: Vec<JoinIntegrityWarning> = first_seen_order
            .into_iter()
            .filter_map(|key| {
                let occurrences = seen[&key];
                (occurrences > 1).then(|| JoinIntegrityWarning {
                    country_code: key,
                    occurrences,
                })
            })
            .collect();

        (kept, warnings)
    }
}

/// Deduplicated lookup by country code
#[derive(Debug)]
pub struct CountryIndex<'a> {
    by_code: HashMap<String, &'a CountryRecord>,
    warnings: Vec<JoinIntegrityWarning>,
}

impl<'a> CountryIndex<'a> {
    pub fn build(reference: &'a CountryReference) -> Self {
        let (kept, warnings) = reference.deduplicated();
        let by_code = kept
            .into_iter()
            .map(|r| (r.country_code.to_ascii_uppercase(), r))
            .collect();
        Self { by_code, warnings }
    }

    pub fn get(&self, country_code: &str) -> Option<&'a CountryRecord> {
        self.by_code
            .get(&country_code.trim().to_ascii_uppercase())
            .copied()
    }

    pub fn warnings(&self) -> &[JoinIntegrityWarning] {
        &self.warnings
    }
}
