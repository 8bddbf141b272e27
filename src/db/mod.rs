//! Log store access
//!
//! Read-only queries over the resolver's `logs` table. Every query is scoped
//! to one month bound as a parameter; the month is validated before the
//! store is touched.

pub mod rollups;
pub mod schema;

use serde::Serialize;
use sqlx::{Pool, Sqlite, SqlitePool};
use tracing::debug;

use crate::config::{DatabaseConfig, LinkConfig};
use crate::error::{ReportError, Result};
use crate::month::Month;
use crate::sink::{Cell, Tabular};

pub use rollups::{
    AggregateResult, BrowserDeviceRow, CountryRow, DailyRow, Hyperlink, NaanRow, RollupKind,
    SchemeRow,
};

const SUMMARY_SQL: &str = r#"
SELECT
    COUNT(*) AS total,
    COUNT(DISTINCT id_scheme || ':' || id_value) AS identifiers,
    COUNT(DISTINCT country_code) AS countries
FROM logs
WHERE m = ?
"#;

#[derive(Debug, Clone)]
pub struct LogStore {
    pool: Pool<Sqlite>,
    links: LinkConfig,
}

impl LogStore {
    /// Open the store read-only. Fails with `StoreAccess` if the file is missing.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{}?mode=ro", config.url))
            .await
            .map_err(|source| ReportError::StoreAccess {
                rollup: "open",
                month: 0,
                source,
            })?;
        debug!("Opened log store {}", config.url);
        Ok(Self::with_pool(pool))
    }

    pub fn with_pool(pool: Pool<Sqlite>) -> Self {
        Self {
            pool,
            links: LinkConfig::default(),
        }
    }

    pub fn with_links(mut self, links: LinkConfig) -> Self {
        self.links = links;
        self
    }

    /// Release the underlying connections.
    pub async fn close(self) {
        self.pool.close().await;
    }

    /// Run one rollup for `month`. Out-of-range months never reach the store.
    pub async fn run_rollup(&self, kind: RollupKind, month: i64) -> Result<AggregateResult> {
        let month = Month::new(month)?;
        self.run_rollup_for(kind, month).await
    }

    pub async fn run_rollup_for(&self, kind: RollupKind, month: Month) -> Result<AggregateResult> {
        let result = rollups::fetch(&self.pool, kind, month.as_i64(), &self.links)
            .await
            .map_err(|source| ReportError::StoreAccess {
                rollup: kind.name(),
                month: month.as_i64(),
                source,
            })?;
        debug!("Rollup {} for month {} returned {} rows", kind, month, result.len());
        Ok(result)
    }

    pub async fn month_summary(&self, month: Month) -> Result<MonthSummary> {
        let (total, identifiers, countries): (i64, i64, i64) = sqlx::query_as(SUMMARY_SQL)
            .bind(month.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(|source| ReportError::StoreAccess {
                rollup: "summary",
                month: month.as_i64(),
                source,
            })?;

        Ok(MonthSummary {
            month: month.get(),
            total: u64::try_from(total).unwrap_or(0),
            identifiers: u64::try_from(identifiers).unwrap_or(0),
            countries: u64::try_from(countries).unwrap_or(0),
        })
    }
}

/// Headline figures for a month
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthSummary {
    pub month: u8,
    pub total: u64,
    pub identifiers: u64,
    pub countries: u64,
}

impl Tabular for MonthSummary {
    fn columns(&self) -> Vec<&'static str> {
        vec!["month", "resolutions", "identifiers", "countries"]
    }

    fn rows(&self) -> Vec<Vec<Cell>> {
        vec![vec![
            Cell::Int(i64::from(self.month)),
            Cell::count(self.total),
            Cell::count(self.identifiers),
            Cell::count(self.countries),
        ]]
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for building throwaway stores in tests

    use super::schema;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};

    #[derive(Debug, Clone, Default)]
    pub struct Entry {
        pub month: i64,
        pub day: i64,
        pub scheme: &'static str,
        pub value: &'static str,
        pub country: Option<&'static str>,
        pub browser: Option<&'static str>,
        pub device: Option<&'static str>,
    }

    pub fn entry(month: i64, day: i64, scheme: &'static str, value: &'static str) -> Entry {
        Entry {
            month,
            day,
            scheme,
            value,
            ..Default::default()
        }
    }

    /// Single-connection in-memory pool, so every query sees the same database.
    pub async fn memory_pool() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for stmt in schema::ALL {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        pool
    }

    pub async fn insert(pool: &Pool<Sqlite>, entries: &[Entry]) {
        for (i, e) in entries.iter().enumerate() {
            sqlx::query(schema::INSERT_LOG)
                .bind(format!("row-{i}"))
                .bind(format!("2024-{:02}-{:02}T00:00:00", e.month, e.day))
                .bind(2024_i64)
                .bind(e.month)
                .bind(e.day)
                .bind(0_i64)
                .bind("192.0.2.1")
                .bind(e.scheme)
                .bind(e.value)
                .bind(e.country)
                .bind(e.browser)
                .bind(None::<String>)
                .bind(e.device)
                .bind(None::<String>)
                .bind(None::<String>)
                .bind(None::<String>)
                .bind(None::<String>)
                .execute(pool)
                .await
                .unwrap();
        }
    }
}
