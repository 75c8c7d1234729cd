mod config;
mod error;
mod models;
mod pipeline;
mod scraper;
mod sink;
mod storage;
mod utils;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{AppConfig, StoreBackend, StoreConfig};
use crate::pipeline::{CrawlOutcome, Pipeline};
use crate::scraper::{BrowserFetcher, SourceSelection};
use crate::sink::{SinkMode, UpsertSummary};
use crate::storage::{RaceStore, Repository, RestStore};

#[derive(Parser)]
#[command(name = "race-crawler", about = "Marathon race listing crawler", version)]
struct Cli {
    /// Write the merged races to a JSON file
    #[arg(long)]
    json: bool,

    /// Insert new races into the races table
    #[arg(long)]
    save: bool,

    /// Which site(s) to crawl
    #[arg(long, value_enum, default_value_t = SourceSelection::All)]
    source: SourceSelection,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "race_crawler=info,warn",
        1 => "race_crawler=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;
    let mode = SinkMode::from_flags(cli.json, cli.save);
    let adapters = cli.source.adapters().context("Invalid source URL")?;
    let today = Local::now().date_naive();

    let _t = utils::Timer::start(format!("Crawl ({})", cli.source.tag()));

    let fetcher = BrowserFetcher::launch(&config.crawler)
        .await
        .context("Failed to launch headless browser")?;
    let outcome = Pipeline::new(&fetcher, &config.crawler).run(&adapters, today).await;
    fetcher.close().await;

    let saved = match mode {
        SinkMode::Preview => {
            sink::print_preview(&outcome.races, config.crawler.preview_limit);
            None
        }
        SinkMode::Json => {
            if let Err(e) = sink::export_json(
                &config.output.dir,
                cli.source.tag(),
                today,
                &outcome.races,
                &outcome.review,
            ) {
                warn!("JSON export failed: {:#}", e);
            }
            None
        }
        SinkMode::Save => save(&config.store, &outcome).await,
    };

    print_summary(&outcome, saved);
    Ok(())
}

/// Run the store sink; `None` when the store is unconfigured or unreachable.
async fn save(store_cfg: &StoreConfig, outcome: &CrawlOutcome) -> Option<UpsertSummary> {
    let store: Box<dyn RaceStore> = match open_store(store_cfg) {
        Ok(Some(store)) => store,
        Ok(None) => {
            warn!("Store URL / key not configured (RACES__STORE__URL, RACES__STORE__KEY), skipping save");
            return None;
        }
        Err(e) => {
            warn!("Could not open store: {:#}, skipping save", e);
            return None;
        }
    };

    info!("Saving {} races…", outcome.races.len());
    Some(sink::upsert_races(store.as_ref(), &outcome.races).await)
}

fn open_store(cfg: &StoreConfig) -> Result<Option<Box<dyn RaceStore>>> {
    match cfg.backend {
        StoreBackend::Rest => {
            let Some((url, key)) = cfg.credentials() else {
                return Ok(None);
            };
            let store = RestStore::new(url, key, Duration::from_secs(cfg.timeout_secs))
                .context("REST store")?;
            Ok(Some(Box::new(store)))
        }
        StoreBackend::Duckdb => {
            let repo = Repository::open(&cfg.db_path)
                .with_context(|| format!("DuckDB at {:?}", cfg.db_path))?;
            info!("{} races already in {:?}", repo.race_count().unwrap_or(0), cfg.db_path);
            Ok(Some(Box::new(repo)))
        }
    }
}

fn print_summary(outcome: &CrawlOutcome, saved: Option<UpsertSummary>) {
    println!("─────────────────────────────────────────────");
    println!("  Race crawl summary");
    println!("─────────────────────────────────────────────");
    for s in &outcome.sources {
        match &s.error {
            Some(e) => println!("  {:<14} : failed ({})", s.source, e),
            None => println!(
                "  {:<14} : {} rows → {} races, {} rejected, {} duplicates",
                s.source, s.extracted, s.normalized, s.rejected, s.duplicates
            ),
        }
    }
    println!("  Merged         : {} races", outcome.races.len());
    println!("  Cross-source   : {} duplicates dropped", outcome.cross_source_duplicates);
    println!("  Needs review   : {}", outcome.review.len());
    if let Some(s) = saved {
        println!("  Store          : {} inserted, {} skipped, {} failed", s.inserted, s.skipped, s.failed);
    }
    println!("─────────────────────────────────────────────");
}
