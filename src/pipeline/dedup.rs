use crate::models::{RaceKey, RaceRecord};
use std::collections::HashSet;

/// Records kept so far plus the (name, date) keys already claimed.
///
/// Passed by value through each merge so every stage stays a plain function
/// of its inputs. First-seen wins; later copies are counted and dropped.
#[derive(Debug, Default)]
pub struct RaceIndex {
    seen: HashSet<RaceKey>,
    records: Vec<RaceRecord>,
    dropped: usize,
}

impl RaceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(mut self, batch: impl IntoIterator<Item = RaceRecord>) -> Self {
        for record in batch {
            if self.seen.insert(record.key()) {
                self.records.push(record);
            } else {
                self.dropped += 1;
            }
        }
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn into_records(self) -> Vec<RaceRecord> {
        self.records
    }
}

/// Collapse duplicates within a single batch, keeping processing order.
pub fn dedup(records: Vec<RaceRecord>) -> (Vec<RaceRecord>, usize) {
    let index = RaceIndex::new().merge(records);
    let dropped = index.dropped();
    (index.into_records(), dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn rec(name: &str, day: u32, source: &str, location: &str) -> RaceRecord {
        RaceRecord {
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(2026, 4, day).unwrap(),
            location: location.to_string(),
            distance: String::new(),
            registration_url: None,
            organizer: None,
            phone: None,
            source: source.to_string(),
        }
    }

    #[test]
    fn test_first_seen_wins() {
        let (out, dropped) = dedup(vec![
            rec("벚꽃런", 5, "roadrun.co.kr", "여의도"),
            rec("벚꽃런", 5, "gorunning.kr", "서울"),
        ]);
        assert_eq!(dropped, 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source, "roadrun.co.kr");
        assert_eq!(out[0].location, "여의도");
    }

    #[test]
    fn test_key_is_exact() {
        let (out, dropped) = dedup(vec![
            rec("벚꽃런", 5, "a", ""),
            rec("벚꽃 런", 5, "a", ""),
            rec("벚꽃런", 6, "a", ""),
        ]);
        assert_eq!(dropped, 0);
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_merge_across_batches_keeps_source_order() {
        let index = RaceIndex::new()
            .merge(vec![rec("A", 1, "first", ""), rec("B", 1, "first", "")])
            .merge(vec![rec("B", 1, "second", ""), rec("C", 1, "second", "")]);

        assert_eq!(index.len(), 3);
        assert_eq!(index.dropped(), 1);
        let out = index.into_records();
        let got: Vec<(&str, &str)> = out.iter().map(|r| (r.name.as_str(), r.source.as_str())).collect();
        assert_eq!(got, vec![("A", "first"), ("B", "first"), ("C", "second")]);
    }
}
