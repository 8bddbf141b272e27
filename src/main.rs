//! n2t-report - monthly usage report for the N2T resolver
//!
//! Reads the resolver's request log for one month and emits:
//! - Daily, scheme, NAAN and browser/device rollups
//! - Country counts joined with the ISO reference table
//! - A world choropleth keyed by ISO alpha-3

use anyhow::Result;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use n2t_report::config::Config;
use n2t_report::db::LogStore;
use n2t_report::report::{self, ReportInputs};
use n2t_report::sink::JsonLinesSink;
use n2t_report::Month;

#[derive(Debug, Parser)]
#[command(name = "n2t-report", about = "Monthly usage report for the N2T resolver")]
struct Args {
    /// Month to report on (1-12)
    #[arg(short, long)]
    month: String,

    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Write rendered tables here instead of stdout
    #[arg(short, long)]
    output: Option<String>,
}

fn init_logging(level: &str) {
    // LOG_FORMAT=gcp for structured GCP Cloud Logging
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    let config = Config::load(&args.config)?;
    init_logging(&config.logging.level);
    info!("Configuration loaded from {}", args.config);

    // Reject a bad month before the store is opened
    let month = Month::parse(&args.month)?;

    let store = LogStore::open(&config.database)
        .await?
        .with_links(config.links.clone());
    let inputs = ReportInputs::from(&config);

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let mut sink = JsonLinesSink::new(writer);

    let outcome = report::run_month(store, &inputs, month, &mut sink).await;
    sink.into_inner().flush()?;

    if !outcome.is_success() {
        let failed: Vec<String> = outcome
            .failures
            .iter()
            .map(|f| format!("{}: {}", f.section, f.message))
            .collect();
        anyhow::bail!("report for month {} incomplete: {}", month, failed.join("; "));
    }

    info!("Report for month {} complete", month);
    Ok(())
}
