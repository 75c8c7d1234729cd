//! Normalization of raw extraction rows into `RaceRecord`s.

use crate::models::{RaceRecord, RawRace, RejectReason};
use chrono::{Datelike, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;

static SLASH_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})/(\d{1,2})").expect("slash date regex"));
static KOREAN_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})월\s*(\d{1,2})일").expect("korean date regex"));
static FULL_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[-.](\d{1,2})[-.](\d{1,2})").expect("full date regex"));

/// First distance keyword in a combined "name + distance" cell.
static DISTANCE_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(풀코스|하프코스|풀|하프|울트라|\d+\.?\d*\s*km|\d+\.?\d*\s*k)")
        .expect("distance keyword regex")
});
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"☎\s*([\d-]+)").expect("phone regex"));
/// A bare kilometre figure: "42.195", "21km", "10k".
static KM_FIGURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*(?:km|k)?$").expect("km figure regex"));
static SPACED_UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d)\s+(km|k)\b").expect("spaced unit regex"));

// ── Dates ─────────────────────────────────────────────────────────────────────

/// Resolve a listing date against `today`.
///
/// "03/17" and "3월 17일" have no year: the current year is used, rolled
/// forward by one when the month is already behind the current month.
/// "2026-03-17" / "2026.03.17" are taken as-is.
pub fn resolve_date(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    let text = text.trim();

    if let Some(c) = FULL_DATE_RE.captures(text) {
        let year = c[1].parse().ok()?;
        let month = c[2].parse().ok()?;
        let day = c[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    let c = SLASH_DATE_RE
        .captures(text)
        .or_else(|| KOREAN_DATE_RE.captures(text))?;
    let month: u32 = c[1].parse().ok()?;
    let day: u32 = c[2].parse().ok()?;

    let year = if month < today.month() { today.year() + 1 } else { today.year() };
    NaiveDate::from_ymd_opt(year, month, day)
}

// ── Name / distance ───────────────────────────────────────────────────────────

/// Split "서울마라톤풀코스" into ("서울마라톤", "풀코스").
///
/// A keyword at position 0 would leave no name, so the whole text stays the
/// name and distance is empty, same as when no keyword is found.
pub fn split_name_distance(text: &str) -> (String, String) {
    let text = text.trim();
    match DISTANCE_KEYWORD_RE.find(text) {
        Some(m) if m.start() > 0 => (
            text[..m.start()].trim().to_string(),
            text[m.start()..].trim().to_string(),
        ),
        _ => (text.to_string(), String::new()),
    }
}

/// Canonical tag for a single distance label.
/// "풀코스" → Full | "21km" → Half | "10k" → 10K | "울트라" → 울트라
///
/// Numeric labels are matched on the whole figure, so "42.195km" is Full and
/// "15km" stays "15KM".
pub fn normalize_distance(distance: &str) -> String {
    let d = distance.trim().to_lowercase();

    if let Some(c) = KM_FIGURE_RE.captures(&d) {
        let tag = match &c[1] {
            "42" | "42.195" => "Full",
            "21" | "21.0975" => "Half",
            "10" => "10K",
            "5" => "5K",
            "6" => "6K",
            "3" => "3K",
            _ => return distance.trim().to_uppercase(),
        };
        return tag.to_string();
    }

    if d == "풀" || ["풀코스", "풀마라톤", "full"].iter().any(|k| d.contains(k)) {
        "Full".to_string()
    } else if ["하프", "half", "반마라톤"].iter().any(|k| d.contains(k)) {
        "Half".to_string()
    } else {
        distance.trim().to_uppercase()
    }
}

/// Split on commas / whitespace and normalize each segment.
pub fn parse_distances(distance: &str) -> Vec<String> {
    let joined = SPACED_UNIT_RE.replace_all(distance, "$1$2");
    joined
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.trim().is_empty())
        .map(normalize_distance)
        .collect()
}

/// Canonical, de-duplicated tags joined with ", ".
pub fn canonical_distance(distance: &str) -> String {
    let mut tags: Vec<String> = Vec::new();
    for tag in parse_distances(distance) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags.join(", ")
}

// ── Organizer / phone ─────────────────────────────────────────────────────────

/// "서울시 ☎ 02-1234-5678" → ("서울시", Some("02-1234-5678"))
pub fn split_organizer_phone(cell: &str) -> (String, Option<String>) {
    let phone = PHONE_RE.captures(cell).map(|c| c[1].to_string());
    let organizer = PHONE_RE.replace(cell, "").trim().to_string();
    (organizer, phone)
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}

// ── RawRace → RaceRecord ──────────────────────────────────────────────────────

pub fn raw_to_record(
    raw: &RawRace,
    source: &str,
    today: NaiveDate,
) -> Result<RaceRecord, RejectReason> {
    let date = resolve_date(&raw.date, today).ok_or(RejectReason::UnparseableDate)?;

    let (name, distance) = match &raw.distance {
        Some(d) => (raw.title.trim().to_string(), d.clone()),
        None => split_name_distance(&raw.title),
    };
    if name.is_empty() {
        return Err(RejectReason::EmptyName);
    }

    let (organizer, phone) = split_organizer_phone(&raw.organizer);

    Ok(RaceRecord {
        name,
        date,
        location: raw.location.trim().to_string(),
        distance: canonical_distance(&distance),
        registration_url: raw.link.clone(),
        organizer: non_empty(organizer),
        phone,
        source: source.to_string(),
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
