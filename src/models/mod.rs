use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ── Race record ───────────────────────────────────────────────────────────────

/// A normalized race listing, ready for export or the `races` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RaceRecord {
    pub name: String,
    pub date: NaiveDate,
    pub location: String,
    pub distance: String,          // "Full, Half, 10K"
    pub registration_url: Option<String>,
    pub organizer: Option<String>,
    pub phone: Option<String>,
    pub source: String,            // "roadrun.co.kr", "gorunning.kr"
}

impl RaceRecord {
    pub fn key(&self) -> RaceKey {
        RaceKey::new(&self.name, self.date)
    }
}

/// Identity of a race: exact (name, date) pair. No fuzzy matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RaceKey {
    pub name: String,
    pub date: NaiveDate,
}

impl RaceKey {
    pub fn new(name: &str, date: NaiveDate) -> Self {
        Self {
            name: name.trim().to_string(),
            date,
        }
    }
}

// ── Store row ─────────────────────────────────────────────────────────────────

/// Columns the crawler writes into `races`. `phone` and `source` stay local.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewRaceRow<'a> {
    pub name: &'a str,
    pub date: NaiveDate,
    pub location: &'a str,
    pub distance: &'a str,
    pub registration_url: Option<&'a str>,
    pub organizer: Option<&'a str>,
}

impl<'a> From<&'a RaceRecord> for NewRaceRow<'a> {
    fn from(r: &'a RaceRecord) -> Self {
        Self {
            name: &r.name,
            date: r.date,
            location: &r.location,
            distance: &r.distance,
            registration_url: r.registration_url.as_deref(),
            organizer: r.organizer.as_deref(),
        }
    }
}

// ── Raw extraction rows ───────────────────────────────────────────────────────

/// Field tuple straight out of a site adapter, before normalization.
///
/// Table rows put name and distance together in `title` and leave `distance`
/// as `None`; card rows have already scanned distances out of the card text.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RawRace {
    pub date: String,              // "03/17", "01월 18일"
    pub title: String,
    pub distance: Option<String>,
    pub location: String,
    pub organizer: String,         // may still carry "☎ 02-..."
    pub link: Option<String>,
}

// ── Review side channel ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    UnparseableDate,
    EmptyName,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::UnparseableDate => f.write_str("unparseable date"),
            RejectReason::EmptyName => f.write_str("empty name"),
        }
    }
}

/// A raw row the normalizer could not turn into a `RaceRecord`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Rejected {
    pub source: String,
    pub reason: RejectReason,
    pub raw: RawRace,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_trims_name() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 17).unwrap();
        assert_eq!(RaceKey::new("  서울마라톤 ", date), RaceKey::new("서울마라톤", date));
        assert_ne!(RaceKey::new("서울 마라톤", date), RaceKey::new("서울마라톤", date));
    }

    #[test]
    fn test_record_serializes_iso_date() {
        let record = RaceRecord {
            name: "서울마라톤".into(),
            date: NaiveDate::from_ymd_opt(2026, 3, 7).unwrap(),
            location: "광화문".into(),
            distance: "Full".into(),
            registration_url: None,
            organizer: Some("서울시".into()),
            phone: None,
            source: "roadrun.co.kr".into(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2026-03-07");
        assert_eq!(json["registration_url"], serde_json::Value::Null);
    }
}
