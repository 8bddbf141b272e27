//! Report sink contract
//!
//! Rendering lives outside the core. Everything the core produces is handed
//! over as a finished `Tabular` value plus `RenderOptions`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::db::Hyperlink;
use crate::error::{ReportError, Result};

/// One table cell. `Missing` means "no data" and is never the same as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Int(i64),
    Text(String),
    Link(Hyperlink),
    Null,
    Missing,
}

impl Cell {
    pub fn count(count: u64) -> Self {
        Self::Int(i64::try_from(count).unwrap_or(i64::MAX))
    }

    pub fn text_or_null(value: Option<&str>) -> Self {
        match value {
            Some(v) => Self::Text(v.to_string()),
            None => Self::Null,
        }
    }
}

/// Anything the core can hand to a sink
pub trait Tabular {
    fn columns(&self) -> Vec<&'static str>;

    fn rows(&self) -> Vec<Vec<Cell>>;

    /// Chart geometry for map-like outputs
    fn geojson(&self) -> Option<serde_json::Value> {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderOptions {
    pub title: String,
    pub scrollable: bool,
    pub paginated: bool,
    /// Empty means all columns, in table order
    pub columns_shown: Vec<String>,
}

impl RenderOptions {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn scrollable(mut self) -> Self {
        self.scrollable = true;
        self
    }

    pub fn paginated(mut self) -> Self {
        self.paginated = true;
        self
    }

    pub fn show_columns(mut self, columns: &[&str]) -> Self {
        self.columns_shown = columns.iter().map(|c| c.to_string()).collect();
        self
    }
}

pub trait ReportSink {
    fn render(&mut self, table: &dyn Tabular, options: &RenderOptions) -> Result<()>;
}

/// A table after it has been handed to a sink
#[derive(Debug, Clone, Serialize)]
pub struct RenderedTable {
    pub options: RenderOptions,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geojson: Option<serde_json::Value>,
}

impl RenderedTable {
    fn capture(table: &dyn Tabular, options: &RenderOptions) -> Self {
        Self {
            options: options.clone(),
            columns: table.columns(),
            rows: table.rows(),
            geojson: table.geojson(),
        }
    }

    pub fn column(&self, name: &str) -> Option<Vec<&Cell>> {
        let idx = self.columns.iter().position(|c| *c == name)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }
}

/// Keeps every rendered table in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub rendered: Vec<RenderedTable>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, title: &str) -> Option<&RenderedTable> {
        self.rendered.iter().find(|t| t.options.title == title)
    }
}

impl ReportSink for MemorySink {
    fn render(&mut self, table: &dyn Tabular, options: &RenderOptions) -> Result<()> {
        self.rendered.push(RenderedTable::capture(table, options));
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    rendered_at: DateTime<Utc>,
    #[serde(flatten)]
    table: &'a RenderedTable,
}

/// Writes one JSON document per rendered table, newline separated
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn render(&mut self, table: &dyn Tabular, options: &RenderOptions) -> Result<()> {
        let table = RenderedTable::capture(table, options);
        let doc = JsonDocument {
            rendered_at: Utc::now(),
            table: &table,
        };
        // Serialize fully before touching the writer
        let mut line = serde_json::to_vec(&doc).map_err(|e| ReportError::Sink(e.to_string()))?;
        line.push(b'\n');
        self.writer
            .write_all(&line)
            .and_then(|_| self.writer.flush())
            .map_err(|e| ReportError::Sink(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Pairs(Vec<(&'static str, u64)>);

    impl Tabular for Pairs {
        fn columns(&self) -> Vec<&'static str> {
            vec!["key", "count"]
        }

        fn rows(&self) -> Vec<Vec<Cell>> {
            self.0
                .iter()
                .map(|(k, c)| vec![Cell::Text(k.to_string()), Cell::count(*c)])
                .collect()
        }
    }

    #[test]
    fn memory_sink_records_tables() {
        let mut sink = MemorySink::new();
        let options = RenderOptions::titled("Pairs").scrollable();
        sink.render(&Pairs(vec![("a", 2), ("b", 1)]), &options).unwrap();

        let table = sink.find("Pairs").unwrap();
        assert!(table.options.scrollable);
        assert!(!table.options.paginated);
        assert_eq!(
            table.column("count").unwrap(),
            vec![&Cell::Int(2), &Cell::Int(1)]
        );
    }

    #[test]
    fn json_sink_writes_one_line_per_table() {
        let mut sink = JsonLinesSink::new(Vec::new());
        let options = RenderOptions::titled("Pairs").show_columns(&["key"]);
        sink.render(&Pairs(vec![("a", 2)]), &options).unwrap();
        sink.render(&Pairs(vec![]), &RenderOptions::titled("Empty")).unwrap();

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<serde_json::Value> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["options"]["title"], "Pairs");
        assert_eq!(lines[0]["options"]["columns_shown"][0], "key");
        assert_eq!(lines[0]["rows"][0][1]["value"], 2);
        assert!(lines[0].get("geojson").is_none());
        assert!(lines[1]["rendered_at"].is_string());
    }

    /// Records every `write` call it receives
    #[derive(Default)]
    struct Chunks(Vec<Vec<u8>>);

    impl Write for Chunks {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_sink_hands_writer_whole_lines() {
        let mut sink = JsonLinesSink::new(Chunks::default());
        sink.render(&Pairs(vec![("a", 2), ("b", 1)]), &RenderOptions::titled("Pairs"))
            .unwrap();

        let chunks = sink.into_inner().0;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].last(), Some(&b'\n'));
        let doc: serde_json::Value = serde_json::from_slice(&chunks[0]).unwrap();
        assert_eq!(doc["rows"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn json_sink_reports_write_failure() {
        let mut sink = JsonLinesSink::new(Broken);
        let err = sink
            .render(&Pairs(vec![("a", 2)]), &RenderOptions::titled("Pairs"))
            .unwrap_err();
        assert!(matches!(err, ReportError::Sink(msg) if msg.contains("disk full")));
    }

    struct Links;

    impl Tabular for Links {
        fn columns(&self) -> Vec<&'static str> {
            vec!["scheme", "count"]
        }

        fn rows(&self) -> Vec<Vec<Cell>> {
            vec![vec![
                Cell::Link(Hyperlink::new("<ark>", "https://n2t.net/ark")),
                Cell::count(4),
            ]]
        }
    }

    #[test]
    fn json_sink_emits_escaped_link_html() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.render(&Links, &RenderOptions::titled("Schemes")).unwrap();

        let out = sink.into_inner();
        let doc: serde_json::Value = serde_json::from_slice(&out).unwrap();
        let link = &doc["rows"][0][0];
        assert_eq!(link["type"], "link");
        assert_eq!(link["value"]["label"], "<ark>");
        assert_eq!(
            link["value"]["html"],
            r#"<a href="https://n2t.net/ark">&lt;ark&gt;</a>"#
        );
    }

    #[test]
    fn missing_is_distinct_from_zero() {
        assert_ne!(Cell::Missing, Cell::count(0));
        assert_eq!(
            serde_json::to_value(Cell::Missing).unwrap(),
            serde_json::json!({"type": "missing"})
        );
    }
}
