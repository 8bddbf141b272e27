//! End-to-end report runs against a throwaway SQLite store

use std::path::{Path, PathBuf};

use n2t_report::config::{DatabaseConfig, GeoConfig, ReferenceConfig};
use n2t_report::db::schema;
use n2t_report::db::LogStore;
use n2t_report::report::{run_month, ReportInputs, Section};
use n2t_report::sink::{Cell, MemorySink};
use n2t_report::{Month, ReportError};
use sqlx::SqlitePool;
use tempfile::TempDir;

struct Log {
    month: i64,
    day: i64,
    scheme: &'static str,
    value: &'static str,
    country: Option<&'static str>,
    browser: Option<&'static str>,
}

fn log(month: i64, day: i64, scheme: &'static str, value: &'static str) -> Log {
    Log {
        month,
        day,
        scheme,
        value,
        country: None,
        browser: None,
    }
}

const COUNTRIES: &str = r#""Country", "Alpha-2 code", "Alpha-3 code", "Numeric code"
"United States", "us", "USA", "840"
"United States", "us", "USA", "840"
"France", "FR", "FRA", "250"
"#;

const WORLD: &str = r#"{"type": "FeatureCollection", "features": [
    {"type": "Feature", "properties": {"iso_a3": "USA", "name": "United States of America"},
     "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}},
    {"type": "Feature", "properties": {"iso_a3": "FRA", "name": "France"},
     "geometry": {"type": "Polygon", "coordinates": [[[2,2],[3,2],[3,3],[2,2]]]}},
    {"type": "Feature", "properties": {"iso_a3": "BRA", "name": "Brazil"},
     "geometry": {"type": "Polygon", "coordinates": [[[4,4],[5,4],[5,5],[4,4]]]}}
]}"#;

struct Fixture {
    dir: TempDir,
    db_path: PathBuf,
}

impl Fixture {
    async fn new(logs: &[Log]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("logs.sqlite3");
        seed(&db_path, logs).await;
        std::fs::write(dir.path().join("countries.csv"), COUNTRIES).unwrap();
        std::fs::write(dir.path().join("world.geojson"), WORLD).unwrap();
        Self { dir, db_path }
    }

    async fn store(&self) -> LogStore {
        LogStore::open(&DatabaseConfig {
            url: self.db_path.display().to_string(),
        })
        .await
        .unwrap()
    }

    fn inputs(&self) -> ReportInputs {
        ReportInputs {
            reference: ReferenceConfig {
                countries_path: self.dir.path().join("countries.csv").display().to_string(),
                name_column: "Country".into(),
            },
            geo: GeoConfig {
                world_path: self.dir.path().join("world.geojson").display().to_string(),
                key_property: "iso_a3".into(),
            },
        }
    }
}

async fn seed(path: &Path, logs: &[Log]) {
    let pool = SqlitePool::connect(&format!("sqlite:{}?mode=rwc", path.display()))
        .await
        .unwrap();
    for stmt in schema::ALL {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    for (i, l) in logs.iter().enumerate() {
        sqlx::query(schema::INSERT_LOG)
            .bind(format!("id-{i}"))
            .bind(format!("2023-{:02}-{:02}T12:00:00", l.month, l.day))
            .bind(2023_i64)
            .bind(l.month)
            .bind(l.day)
            .bind(0_i64)
            .bind("198.51.100.7")
            .bind(l.scheme)
            .bind(l.value)
            .bind(l.country)
            .bind(l.browser)
            .bind(None::<String>)
            .bind(None::<String>)
            .bind(None::<String>)
            .bind(None::<String>)
            .bind(None::<String>)
            .bind(None::<String>)
            .execute(&pool)
            .await
            .unwrap();
    }
    pool.close().await;
}

fn may_logs() -> Vec<Log> {
    let mut logs = vec![
        log(5, 1, "ark", "77911/x1"),
        log(5, 2, "ark", "77911/x2"),
        log(5, 2, "ark", "88888/y1"),
        log(6, 1, "ark", "77911/x3"),
    ];
    for day in 1..=10 {
        logs.push(Log {
            country: Some("us"),
            browser: Some("Firefox"),
            ..log(5, day, "doi", "10.1234/abc")
        });
    }
    logs
}

#[tokio::test]
async fn naan_section_matches_expected_rows() {
    let fixture = Fixture::new(&may_logs()).await;
    let mut sink = MemorySink::new();

    let outcome = run_month(
        fixture.store().await,
        &fixture.inputs(),
        Month::new(5).unwrap(),
        &mut sink,
    )
    .await;
    assert!(outcome.is_success(), "{:?}", outcome.failures);

    let naans = sink.find(Section::Naans.title()).unwrap();
    let labels: Vec<String> = naans
        .column("naan")
        .unwrap()
        .into_iter()
        .map(|c| match c {
            Cell::Link(link) => link.label.clone(),
            other => panic!("expected a link, got {other:?}"),
        })
        .collect();
    assert_eq!(labels, vec!["77911", "88888"]);
    assert_eq!(
        naans.column("count").unwrap(),
        vec![&Cell::Int(2), &Cell::Int(1)]
    );
}

#[tokio::test]
async fn duplicated_reference_row_joins_once() {
    let fixture = Fixture::new(&may_logs()).await;
    let mut sink = MemorySink::new();

    let outcome = run_month(
        fixture.store().await,
        &fixture.inputs(),
        Month::new(5).unwrap(),
        &mut sink,
    )
    .await;

    let countries = sink.find(Section::Countries.title()).unwrap();
    // ARK rows carry no country; the ten DOI rows are all "us"
    let us_rows: Vec<&Vec<Cell>> = countries
        .rows
        .iter()
        .filter(|r| r[0] == Cell::Text("us".into()))
        .collect();
    assert_eq!(us_rows.len(), 1);
    assert_eq!(us_rows[0][1], Cell::Text("USA".into()));
    assert_eq!(us_rows[0][2], Cell::Text("United States".into()));
    assert_eq!(us_rows[0][3], Cell::Int(10));
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].country_code, "US");
}

#[tokio::test]
async fn world_map_lists_every_region_once() {
    let fixture = Fixture::new(&may_logs()).await;
    let mut sink = MemorySink::new();

    run_month(
        fixture.store().await,
        &fixture.inputs(),
        Month::new(5).unwrap(),
        &mut sink,
    )
    .await;

    let map = sink.find(Section::WorldMap.title()).unwrap();
    let codes: Vec<&Cell> = map.column("iso_a3").unwrap();
    assert_eq!(
        codes,
        vec![
            &Cell::Text("USA".into()),
            &Cell::Text("FRA".into()),
            &Cell::Text("BRA".into())
        ]
    );
    assert_eq!(
        map.column("count").unwrap(),
        vec![&Cell::Int(10), &Cell::Missing, &Cell::Missing]
    );
    let geojson = map.geojson.as_ref().unwrap();
    assert_eq!(geojson["features"].as_array().unwrap().len(), 3);
    assert_eq!(geojson["features"][0]["properties"]["color_class"], "1e1");
}

#[tokio::test]
async fn sections_render_in_order() {
    let fixture = Fixture::new(&may_logs()).await;
    let mut sink = MemorySink::new();

    let outcome = run_month(
        fixture.store().await,
        &fixture.inputs(),
        Month::new(5).unwrap(),
        &mut sink,
    )
    .await;

    assert_eq!(
        outcome.rendered,
        vec![
            Section::Summary,
            Section::Daily,
            Section::Schemes,
            Section::Naans,
            Section::Countries,
            Section::WorldMap,
            Section::BrowserDevices,
        ]
    );
    let daily = sink.find(Section::Daily.title()).unwrap();
    let days: Vec<&Cell> = daily.column("day").unwrap();
    assert_eq!(days.len(), 10);
    assert_eq!(days[0], &Cell::Int(1));
    assert_eq!(days[9], &Cell::Int(10));
}

#[tokio::test]
async fn missing_reference_only_fails_country_sections() {
    let fixture = Fixture::new(&may_logs()).await;
    std::fs::remove_file(fixture.dir.path().join("countries.csv")).unwrap();
    let mut sink = MemorySink::new();

    let outcome = run_month(
        fixture.store().await,
        &fixture.inputs(),
        Month::new(5).unwrap(),
        &mut sink,
    )
    .await;

    let failed: Vec<Section> = outcome.failures.iter().map(|f| f.section).collect();
    assert_eq!(failed, vec![Section::Countries, Section::WorldMap]);
    assert!(outcome.failures.iter().all(|f| !f.retryable));
    assert!(sink.find(Section::Countries.title()).is_none());
    assert!(sink.find(Section::Naans.title()).is_some());
    assert!(sink.find(Section::BrowserDevices.title()).is_some());
}

#[tokio::test]
async fn invalid_month_is_rejected_before_querying() {
    let fixture = Fixture::new(&may_logs()).await;
    let store = fixture.store().await;

    let err = store
        .run_rollup(n2t_report::db::RollupKind::Daily, 13)
        .await
        .unwrap_err();
    assert!(matches!(err, ReportError::InvalidParameter { .. }));
    store.close().await;
}

#[tokio::test]
async fn summary_counts_only_the_requested_month() {
    let fixture = Fixture::new(&may_logs()).await;
    let store = fixture.store().await;
    let summary = store.month_summary(Month::new(5).unwrap()).await.unwrap();
    assert_eq!(summary.total, 13);
    store.close().await;
}
