//! Where crawled races end up: console preview, JSON file, or the store.

use crate::models::{RaceRecord, Rejected};
use crate::storage::RaceStore;
use crate::utils::truncate_chars;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Only the first few insert failures are logged in full.
const MAX_LOGGED_FAILURES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    Preview,
    Json,
    Save,
}

impl SinkMode {
    /// `--json` wins over `--save` when both are given.
    pub fn from_flags(json: bool, save: bool) -> Self {
        if json {
            SinkMode::Json
        } else if save {
            SinkMode::Save
        } else {
            SinkMode::Preview
        }
    }
}

// ── Preview ───────────────────────────────────────────────────────────────────

pub fn print_preview(races: &[RaceRecord], limit: usize) {
    print!("{}", format_preview(races, limit));
}

/// At most `limit` records, then a count of the rest.
fn format_preview(races: &[RaceRecord], limit: usize) -> String {
    let rule = "─────────────────────────────────────────────";
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "  {} races (showing up to {})", races.len(), limit);
    let _ = writeln!(out, "{rule}");
    for (i, race) in races.iter().take(limit).enumerate() {
        let _ = writeln!(out, "{:>3}. {} ({})", i + 1, truncate_chars(&race.name, 40), race.source);
        let _ = writeln!(
            out,
            "     {} | {} | {}",
            race.date,
            if race.distance.is_empty() { "—" } else { race.distance.as_str() },
            if race.location.is_empty() { "—" } else { race.location.as_str() },
        );
    }
    if races.len() > limit {
        let _ = writeln!(out, "     … and {} more", races.len() - limit);
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "  --json  write a JSON file");
    let _ = writeln!(out, "  --save  insert into the races table");
    out
}

// ── JSON export ───────────────────────────────────────────────────────────────

pub fn export_path(dir: &Path, source_tag: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("races_{}_{}.json", source_tag, date.format("%Y-%m-%d")))
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize races")?;
    std::fs::write(path, json).with_context(|| format!("write {:?}", path))
}

/// Write `races_<source>_<date>.json` (and a `_review.json` next to it when
/// rows were rejected). Returns the main file's path.
pub fn export_json(
    dir: &Path,
    source_tag: &str,
    date: NaiveDate,
    races: &[RaceRecord],
    review: &[Rejected],
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;

    let path = export_path(dir, source_tag, date);
    write_json(&path, races)?;
    info!("Wrote {} races to {:?}", races.len(), path);

    if !review.is_empty() {
        let review_path = path.with_file_name(format!(
            "races_{}_{}_review.json",
            source_tag,
            date.format("%Y-%m-%d")
        ));
        write_json(&review_path, review)?;
        info!("Wrote {} rows needing review to {:?}", review.len(), review_path);
    }

    Ok(path)
}

// ── Store upsert ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Insert-if-absent by (name, date). Never updates, never retries, never
/// stops early: each failure is counted and the loop moves on.
pub async fn upsert_races(store: &dyn RaceStore, races: &[RaceRecord]) -> UpsertSummary {
    let mut summary = UpsertSummary::default();

    for race in races {
        let outcome = match store.exists(&race.key()).await {
            Ok(true) => {
                summary.skipped += 1;
                continue;
            }
            Ok(false) => store.insert(race).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => summary.inserted += 1,
            Err(e) => {
                if summary.failed < MAX_LOGGED_FAILURES {
                    error!("Failed to save {} ({}): {}", race.name, race.date, e);
                }
                summary.failed += 1;
            }
        }
    }

    info!(
        "Store: {} inserted, {} skipped, {} failed",
        summary.inserted, summary.skipped, summary.failed
    );
    summary
}
