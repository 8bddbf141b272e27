//! Rollup catalog
//!
//! Each rollup is one aggregate query over the `logs` table for a single
//! month, plus whatever post-processing its row shape needs. The month is
//! always bound as a parameter.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use sqlx::{Pool, Sqlite};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::LinkConfig;
use crate::naan::Naan;
use crate::sink::{Cell, Tabular};

/// Scheme value the log processor records for ARK requests
pub const ARK_SCHEME: &str = "ark";

const DAILY_SQL: &str = r#"
SELECT d, COUNT(*) AS count
FROM logs
WHERE m = ? AND d IS NOT NULL
GROUP BY d
ORDER BY d ASC
"#;

const BY_SCHEME_SQL: &str = r#"
SELECT id_scheme, COUNT(*) AS count
FROM logs
WHERE m = ? AND id_scheme IS NOT NULL
GROUP BY id_scheme
ORDER BY count DESC, id_scheme ASC
"#;

// Grouped by full value here; the NAAN fold happens in Rust via `Naan::parse`
const BY_NAAN_SQL: &str = r#"
SELECT COALESCE(id_value, '') AS id_value, COUNT(*) AS count
FROM logs
WHERE m = ? AND id_scheme = ?
GROUP BY COALESCE(id_value, '')
"#;

const BY_COUNTRY_SQL: &str = r#"
SELECT country_code, COUNT(*) AS count
FROM logs
WHERE m = ?
GROUP BY country_code
ORDER BY count DESC, country_code ASC
"#;

const BY_BROWSER_DEVICE_SQL: &str = r#"
SELECT browser_family, device_brand, COUNT(*) AS count
FROM logs
WHERE m = ?
GROUP BY browser_family, device_brand
ORDER BY count DESC, browser_family ASC, device_brand ASC
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupKind {
    Daily,
    ByScheme,
    ByNaan,
    ByCountry,
    ByBrowserDevice,
}

impl RollupKind {
    pub const ALL: [RollupKind; 5] = [
        Self::Daily,
        Self::ByScheme,
        Self::ByNaan,
        Self::ByCountry,
        Self::ByBrowserDevice,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::ByScheme => "by_scheme",
            Self::ByNaan => "by_naan",
            Self::ByCountry => "by_country",
            Self::ByBrowserDevice => "by_browser_device",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Daily => "Resolutions per day",
            Self::ByScheme => "Resolutions by scheme",
            Self::ByNaan => "ARK resolutions by NAAN",
            Self::ByCountry => "Resolutions by country",
            Self::ByBrowserDevice => "Resolutions by browser and device",
        }
    }
}

impl fmt::Display for RollupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A label paired with the resolver page it points at. Serializes with a
/// ready-to-embed `html` anchor alongside the raw parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    pub label: String,
    pub href: String,
}

impl Hyperlink {
    pub fn new(label: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            href: href.into(),
        }
    }

    pub fn to_html(&self) -> String {
        format!(
            r#"<a href="{}">{}</a>"#,
            html_escape::encode_double_quoted_attribute(&self.href),
            html_escape::encode_text(&self.label)
        )
    }
}

impl Serialize for Hyperlink {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut link = serializer.serialize_struct("Hyperlink", 3)?;
        link.serialize_field("label", &self.label)?;
        link.serialize_field("href", &self.href)?;
        link.serialize_field("html", &self.to_html())?;
        link.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyRow {
    pub day: u8,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemeRow {
    pub scheme: String,
    pub link: Hyperlink,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NaanRow {
    pub naan: Naan,
    /// Absent for the unparsed bucket
    pub link: Option<Hyperlink>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryRow {
    pub country_code: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowserDeviceRow {
    pub browser_family: Option<String>,
    pub device_brand: Option<String>,
    pub count: u64,
}

/// Output of one rollup. Row order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rollup", content = "rows", rename_all = "snake_case")]
pub enum AggregateResult {
    Daily(Vec<DailyRow>),
    ByScheme(Vec<SchemeRow>),
    ByNaan(Vec<NaanRow>),
    ByCountry(Vec<CountryRow>),
    ByBrowserDevice(Vec<BrowserDeviceRow>),
}

impl AggregateResult {
    pub fn len(&self) -> usize {
        match self {
            Self::Daily(rows) => rows.len(),
            Self::ByScheme(rows) => rows.len(),
            Self::ByNaan(rows) => rows.len(),
            Self::ByCountry(rows) => rows.len(),
            Self::ByBrowserDevice(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The count column, in row order
    pub fn counts(&self) -> Vec<u64> {
        match self {
            Self::Daily(rows) => rows.iter().map(|r| r.count).collect(),
            Self::ByScheme(rows) => rows.iter().map(|r| r.count).collect(),
            Self::ByNaan(rows) => rows.iter().map(|r| r.count).collect(),
            Self::ByCountry(rows) => rows.iter().map(|r| r.count).collect(),
            Self::ByBrowserDevice(rows) => rows.iter().map(|r| r.count).collect(),
        }
    }

    pub fn as_country_rows(&self) -> Option<&[CountryRow]> {
        match self {
            Self::ByCountry(rows) => Some(rows),
            _ => None,
        }
    }
}

impl Tabular for AggregateResult {
    fn columns(&self) -> Vec<&'static str> {
        match self {
            Self::Daily(_) => vec!["day", "count"],
            Self::ByScheme(_) => vec!["scheme", "count"],
            Self::ByNaan(_) => vec!["naan", "count"],
            Self::ByCountry(_) => vec!["country_code", "count"],
            Self::ByBrowserDevice(_) => vec!["browser_family", "device_brand", "count"],
        }
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        match self {
            Self::Daily(rows) => rows
                .iter()
                .map(|r| vec![Cell::Int(i64::from(r.day)), Cell::count(r.count)])
                .collect(),
            Self::ByScheme(rows) => rows
                .iter()
                .map(|r| vec![Cell::Link(r.link.clone()), Cell::count(r.count)])
                .collect(),
            Self::ByNaan(rows) => rows
                .iter()
                .map(|r| {
                    let label = match &r.link {
                        Some(link) => Cell::Link(link.clone()),
                        None => Cell::Text(r.naan.label().to_string()),
                    };
                    vec![label, Cell::count(r.count)]
                })
                .collect(),
            Self::ByCountry(rows) => rows
                .iter()
                .map(|r| vec![Cell::text_or_null(r.country_code.as_deref()), Cell::count(r.count)])
                .collect(),
            Self::ByBrowserDevice(rows) => rows
                .iter()
                .map(|r| {
                    vec![
                        Cell::text_or_null(r.browser_family.as_deref()),
                        Cell::text_or_null(r.device_brand.as_deref()),
                        Cell::count(r.count),
                    ]
                })
                .collect(),
        }
    }
}

fn to_count(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

pub(super) async fn fetch(
    pool: &Pool<Sqlite>,
    kind: RollupKind,
    month: i64,
    links: &LinkConfig,
) -> Result<AggregateResult, sqlx::Error> {
    match kind {
        RollupKind::Daily => fetch_daily(pool, month).await,
        RollupKind::ByScheme => fetch_by_scheme(pool, month, links).await,
        RollupKind::ByNaan => fetch_by_naan(pool, month, links).await,
        RollupKind::ByCountry => fetch_by_country(pool, month).await,
        RollupKind::ByBrowserDevice => fetch_by_browser_device(pool, month).await,
    }
}

async fn fetch_daily(pool: &Pool<Sqlite>, month: i64) -> Result<AggregateResult, sqlx::Error> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(DAILY_SQL)
        .bind(month)
        .fetch_all(pool)
        .await?;

    Ok(AggregateResult::Daily(
        rows.into_iter()
            .filter_map(|(day, count)| {
                let day = u8::try_from(day).ok()?;
                Some(DailyRow {
                    day,
                    count: to_count(count),
                })
            })
            .collect(),
    ))
}

async fn fetch_by_scheme(
    pool: &Pool<Sqlite>,
    month: i64,
    links: &LinkConfig,
) -> Result<AggregateResult, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(BY_SCHEME_SQL)
        .bind(month)
        .fetch_all(pool)
        .await?;

    Ok(AggregateResult::ByScheme(
        rows.into_iter()
            .map(|(scheme, count)| SchemeRow {
                link: Hyperlink::new(&scheme, format!("{}{}:", links.scheme_base, scheme)),
                scheme,
                count: to_count(count),
            })
            .collect(),
    ))
}

async fn fetch_by_naan(
    pool: &Pool<Sqlite>,
    month: i64,
    links: &LinkConfig,
) -> Result<AggregateResult, sqlx::Error> {
    let rows: Vec<(String, i64)> = sqlx::query_as(BY_NAAN_SQL)
        .bind(month)
        .bind(ARK_SCHEME)
        .fetch_all(pool)
        .await?;

    Ok(AggregateResult::ByNaan(fold_naans(rows, links)))
}

/// Collapse per-value counts into per-NAAN counts, count descending.
fn fold_naans(rows: Vec<(String, i64)>, links: &LinkConfig) -> Vec<NaanRow> {
    let mut totals: BTreeMap<Naan, u64> = BTreeMap::new();
    for (id_value, count) in rows {
        *totals.entry(Naan::parse(&id_value)).or_default() += to_count(count);
    }

    let mut out: Vec<NaanRow> = totals
        .into_iter()
        .map(|(naan, count)| NaanRow {
            link: naan
                .authority()
                .map(|a| Hyperlink::new(a, format!("{}{}", links.naan_base, a))),
            naan,
            count,
        })
        .collect();
    // stable sort keeps the BTreeMap key order for ties
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}

async fn fetch_by_country(pool: &Pool<Sqlite>, month: i64) -> Result<AggregateResult, sqlx::Error> {
    let rows: Vec<(Option<String>, i64)> = sqlx::query_as(BY_COUNTRY_SQL)
        .bind(month)
        .fetch_all(pool)
        .await?;

    Ok(AggregateResult::ByCountry(
        rows.into_iter()
            .map(|(country_code, count)| CountryRow {
                country_code,
                count: to_count(count),
            })
            .collect(),
    ))
}

async fn fetch_by_browser_device(
    pool: &Pool<Sqlite>,
    month: i64,
) -> Result<AggregateResult, sqlx::Error> {
    let rows: Vec<(Option<String>, Option<String>, i64)> = sqlx::query_as(BY_BROWSER_DEVICE_SQL)
        .bind(month)
        .fetch_all(pool)
        .await?;

    Ok(AggregateResult::ByBrowserDevice(
        rows.into_iter()
            .map(|(browser_family, device_brand, count)| BrowserDeviceRow {
                browser_family,
                device_brand,
                count: to_count(count),
            })
            .collect(),
    ))
}
