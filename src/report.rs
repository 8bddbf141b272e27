//! Monthly report runner
//!
//! Runs every section for one month in a fixed order against a single store
//! handle, then closes the store. A failing section is recorded and the run
//! moves on; sections that do not need the failed input are unaffected.

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use crate::config::{Config, GeoConfig, ReferenceConfig};
use crate::db::{LogStore, RollupKind};
use crate::error::{JoinIntegrityWarning, ReportError, Result};
use crate::geo::WorldGeometry;
use crate::join::{join_country, join_geometry};
use crate::month::Month;
use crate::reference::CountryReference;
use crate::sink::{RenderOptions, ReportSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Summary,
    Daily,
    Schemes,
    Naans,
    Countries,
    WorldMap,
    BrowserDevices,
}

impl Section {
    pub fn title(self) -> &'static str {
        match self {
            Self::Summary => "Summary",
            Self::Daily => RollupKind::Daily.title(),
            Self::Schemes => RollupKind::ByScheme.title(),
            Self::Naans => RollupKind::ByNaan.title(),
            Self::Countries => RollupKind::ByCountry.title(),
            Self::WorldMap => "Resolutions by country (map)",
            Self::BrowserDevices => RollupKind::ByBrowserDevice.title(),
        }
    }

    pub fn render_options(self) -> RenderOptions {
        let options = RenderOptions::titled(self.title());
        match self {
            Self::Summary | Self::Daily | Self::WorldMap => options,
            Self::Schemes => options.scrollable().show_columns(&["scheme", "count"]),
            Self::Naans => options.scrollable().paginated(),
            Self::Countries => options
                .scrollable()
                .paginated()
                .show_columns(&["country_code", "name", "count"]),
            Self::BrowserDevices => options.scrollable().paginated(),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// External datasets the country sections join against
#[derive(Debug, Clone)]
pub struct ReportInputs {
    pub reference: ReferenceConfig,
    pub geo: GeoConfig,
}

impl From<&Config> for ReportInputs {
    fn from(config: &Config) -> Self {
        Self {
            reference: config.reference.clone(),
            geo: config.geo.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionFailure {
    pub section: Section,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub month: u8,
    pub rendered: Vec<Section>,
    pub failures: Vec<SectionFailure>,
    pub warnings: Vec<JoinIntegrityWarning>,
}

impl ReportOutcome {
    fn new(month: Month) -> Self {
        Self {
            month: month.get(),
            rendered: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn record(&mut self, section: Section, result: Result<()>) {
        match result {
            Ok(()) => {
                info!("Rendered {}", section);
                self.rendered.push(section);
            }
            Err(e) => self.record_failure(section, &e),
        }
    }

    fn record_failure(&mut self, section: Section, error: &ReportError) {
        warn!("Section '{}' failed for month {}: {}", section, self.month, error);
        self.failures.push(SectionFailure {
            section,
            message: error.to_string(),
            retryable: error.is_retryable(),
        });
    }

    /// Both country sections see the same reference, so each warning is
    /// kept and logged once per run.
    fn add_warnings(&mut self, warnings: &[JoinIntegrityWarning]) {
        for w in warnings {
            if !self.warnings.contains(w) {
                warn!("{}", w);
                self.warnings.push(w.clone());
            }
        }
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

async fn rollup_section(
    store: &LogStore,
    month: Month,
    kind: RollupKind,
    section: Section,
    sink: &mut dyn ReportSink,
) -> Result<()> {
    let result = store.run_rollup_for(kind, month).await?;
    sink.render(&result, &section.render_options())
}

/// Produce every section of the report for `month`. The store is closed
/// before this returns, whatever the section results.
pub async fn run_month(
    store: LogStore,
    inputs: &ReportInputs,
    month: Month,
    sink: &mut dyn ReportSink,
) -> ReportOutcome {
    let mut outcome = ReportOutcome::new(month);
    info!("Building report for month {}", month);

    let summary = store.month_summary(month).await;
    outcome.record(
        Section::Summary,
        summary.and_then(|s| sink.render(&s, &Section::Summary.render_options())),
    );

    for (kind, section) in [
        (RollupKind::Daily, Section::Daily),
        (RollupKind::ByScheme, Section::Schemes),
        (RollupKind::ByNaan, Section::Naans),
    ] {
        let result = rollup_section(&store, month, kind, section, sink).await;
        outcome.record(section, result);
    }

    let reference = CountryReference::load(&inputs.reference.countries_path, &inputs.reference);
    let world = WorldGeometry::load(&inputs.geo.world_path, &inputs.geo);
    let countries = store.run_rollup_for(RollupKind::ByCountry, month).await;

    match (&countries, &reference) {
        (Ok(agg), Ok(reference)) => {
            let rows = agg.as_country_rows().unwrap_or_default();
            let joined = join_country(rows, reference);
            outcome.add_warnings(&joined.warnings);
            let rendered = sink.render(&joined, &Section::Countries.render_options());
            outcome.record(Section::Countries, rendered);
        }
        (Err(e), _) | (_, Err(e)) => outcome.record_failure(Section::Countries, e),
    }

    match (&countries, &reference, &world) {
        (Ok(agg), Ok(reference), Ok(world)) => {
            let rows = agg.as_country_rows().unwrap_or_default();
            let joined = join_geometry(rows, world, reference);
            outcome.add_warnings(&joined.warnings);
            let rendered = sink.render(&joined, &Section::WorldMap.render_options());
            outcome.record(Section::WorldMap, rendered);
        }
        (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => {
            outcome.record_failure(Section::WorldMap, e)
        }
    }

    let browsers = rollup_section(
        &store,
        month,
        RollupKind::ByBrowserDevice,
        Section::BrowserDevices,
        sink,
    )
    .await;
    outcome.record(Section::BrowserDevices, browsers);

    store.close().await;
    info!(
        "Report for month {} finished: {} rendered, {} failed",
        month,
        outcome.rendered.len(),
        outcome.failures.len()
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn duplicate(code: &str) -> JoinIntegrityWarning {
        JoinIntegrityWarning {
            country_code: code.into(),
            occurrences: 2,
        }
    }

    #[test]
    fn warnings_from_both_joins_are_kept_once() {
        let mut outcome = ReportOutcome::new(Month::new(5).unwrap());
        outcome.add_warnings(&[duplicate("US")]);
        outcome.add_warnings(&[duplicate("US"), duplicate("GB")]);
        assert_eq!(outcome.warnings, vec![duplicate("US"), duplicate("GB")]);
    }

    #[test]
    fn failures_are_recorded_with_retryability() {
        let mut outcome = ReportOutcome::new(Month::new(5).unwrap());
        outcome.record(Section::Daily, Ok(()));
        outcome.record(
            Section::Countries,
            Err(ReportError::data_format("countries.csv", "missing column")),
        );
        assert_eq!(outcome.rendered, vec![Section::Daily]);
        assert_eq!(outcome.failures.len(), 1);
        assert!(!outcome.failures[0].retryable);
        assert!(!outcome.is_success());
    }
}
