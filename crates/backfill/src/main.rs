//! tickbar-backfill: build bars for every open date of a set of symbols.
//!
//! Dates already in the database are skipped, so an interrupted run can simply
//! be started again.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tickbar_backfill::{plan_backfill, Backfill, CsvTickSource, SqliteBarStore, WeekdayCalendar};
use tickbar_bars::BarBuilder;
use tickbar_core::{Config, ThresholdConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "tickbar-backfill",
    about = "Build information-driven bars from stored tick files"
)]
struct Cli {
    /// Symbols to backfill, comma separated (e.g. GLD,GOLD).
    #[arg(long, value_delimiter = ',', required = true)]
    symbols: Vec<String>,

    /// First date (YYYY-MM-DD).
    #[arg(long)]
    start: NaiveDate,

    /// Last date (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Root of the tick files, laid out as <root>/<SYMBOL>/<YYYY-MM-DD>.csv.
    #[arg(long, env = "DATA_PATH")]
    data_path: PathBuf,

    /// SQLite database receiving the bars.
    #[arg(long, default_value = "tickbar.sqlite")]
    db: PathBuf,

    /// Full JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON file with bar thresholds; overrides the configuration file.
    #[arg(long)]
    thresholds: Option<PathBuf>,

    /// Concurrent symbol-dates; overrides the configuration file.
    #[arg(long)]
    workers: Option<usize>,

    /// Market holidays to skip, comma separated.
    #[arg(long, value_delimiter = ',')]
    holidays: Vec<NaiveDate>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(filter)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(path) = &cli.thresholds {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading thresholds {}", path.display()))?;
        config.thresholds = ThresholdConfig::from_json_str(&json)
            .with_context(|| format!("parsing thresholds {}", path.display()))?;
    }
    if let Some(workers) = cli.workers {
        config.backfill.workers = workers;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if config.thresholds.is_empty() {
        bail!("no bar threshold configured; every day would produce zero bars");
    }

    let end = cli.end.unwrap_or_else(|| Local::now().date_naive());
    let symbols: Vec<String> = cli.symbols.iter().map(|s| s.trim().to_uppercase()).collect();

    let store = Arc::new(
        SqliteBarStore::open(&cli.db).with_context(|| format!("opening {}", cli.db.display()))?,
    );
    let calendar = WeekdayCalendar::with_holidays(cli.holidays.iter().copied());
    let keys = plan_backfill(&calendar, store.as_ref(), &symbols, cli.start, end)?;
    info!(
        symbols = symbols.len(),
        start = %cli.start,
        end = %end,
        keys = keys.len(),
        workers = config.backfill.workers,
        "starting backfill"
    );

    let builder = BarBuilder::from_config(&config)?;
    let source = Arc::new(CsvTickSource::new(&cli.data_path));
    let summary = Backfill::new(source, store, builder, config.backfill.clone())
        .run(keys)
        .await;

    summary.log_failures();
    if !summary.is_success() {
        bail!("{} symbol-dates failed", summary.failed.len());
    }
    Ok(())
}
