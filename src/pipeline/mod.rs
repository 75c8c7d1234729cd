//! Pipeline orchestrator: fetch → extract → normalize → dedup, per source.
//!
//! Sources run one after another in adapter order, never concurrently. A
//! source that fails to load or extract yields zero records and the run moves
//! on. Results are merged across sources with a final (name, date) dedup pass
//! in which the earlier source's copy survives.

pub mod dedup;

use crate::config::CrawlerConfig;
use crate::models::{RaceRecord, Rejected};
use crate::scraper::cleaner::raw_to_record;
use crate::scraper::{PageFetcher, SiteAdapter};
use chrono::NaiveDate;
use std::time::Duration;
use tracing::{info, warn};

use self::dedup::{dedup, RaceIndex};

pub struct Pipeline<'a> {
    fetcher: &'a dyn PageFetcher,
    inter_source_delay: Duration,
}

impl<'a> Pipeline<'a> {
    pub fn new(fetcher: &'a dyn PageFetcher, config: &CrawlerConfig) -> Self {
        Self {
            fetcher,
            inter_source_delay: Duration::from_millis(config.inter_source_delay_ms),
        }
    }

    pub async fn run(&self, adapters: &[Box<dyn SiteAdapter>], today: NaiveDate) -> CrawlOutcome {
        let mut index = RaceIndex::new();
        let mut review = Vec::new();
        let mut sources = Vec::new();

        for (i, adapter) in adapters.iter().enumerate() {
            if i > 0 && !self.inter_source_delay.is_zero() {
                tokio::time::sleep(self.inter_source_delay).await;
            }

            info!("=== [{}/{}] {} ===", i + 1, adapters.len(), adapter.source());
            let (records, rejected, report) = self.crawl_source(adapter.as_ref(), today).await;

            index = index.merge(records);
            review.extend(rejected);
            sources.push(report);
        }

        let cross_source_duplicates = index.dropped();
        info!(
            "=== Done: {} races after merge | {} cross-source duplicates | {} need review ===",
            index.len(),
            cross_source_duplicates,
            review.len(),
        );
        let races = index.into_records();

        CrawlOutcome { races, review, sources, cross_source_duplicates }
    }

    async fn crawl_source(
        &self,
        adapter: &dyn SiteAdapter,
        today: NaiveDate,
    ) -> (Vec<RaceRecord>, Vec<Rejected>, SourceReport) {
        let source = adapter.source();
        let mut report = SourceReport::new(source);

        let html = match self.fetcher.fetch(adapter.url().as_str(), adapter.load_options()).await {
            Ok(html) => html,
            Err(e) => {
                warn!("{}: {}", source, e);
                report.error = Some(e.to_string());
                return (Vec::new(), Vec::new(), report);
            }
        };

        let raw_rows = match adapter.extract(&html) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("{}: {}", source, e);
                report.error = Some(e.to_string());
                return (Vec::new(), Vec::new(), report);
            }
        };
        report.extracted = raw_rows.len();

        let mut records = Vec::with_capacity(raw_rows.len());
        let mut rejected = Vec::new();

        for raw in raw_rows {
            match raw_to_record(&raw, source, today) {
                Ok(record) => records.push(record),
                Err(reason) => {
                    warn!("{}: needs review ({}): {:?} / {:?}", source, reason, raw.date, raw.title);
                    rejected.push(Rejected { source: source.to_string(), reason, raw });
                }
            }
        }

        let (records, duplicates) = dedup(records);
        report.normalized = records.len();
        report.rejected = rejected.len();
        report.duplicates = duplicates;

        info!(
            "{}: {} rows → {} races ({} rejected, {} duplicates)",
            source, report.extracted, report.normalized, report.rejected, report.duplicates
        );

        (records, rejected, report)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: &'static str,
    pub extracted: usize,
    pub normalized: usize,
    pub rejected: usize,
    pub duplicates: usize,
    pub error: Option<String>,
}

impl SourceReport {
    fn new(source: &'static str) -> Self {
        Self {
            source,
            extracted: 0,
            normalized: 0,
            rejected: 0,
            duplicates: 0,
            error: None,
        }
    }
}

#[derive(Debug)]
pub struct CrawlOutcome {
    pub races: Vec<RaceRecord>,
    pub review: Vec<Rejected>,
    pub sources: Vec<SourceReport>,
    pub cross_source_duplicates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrawlError;
    use crate::models::RejectReason;
    use crate::scraper::{GoRunningAdapter, LoadOptions, RoadRunAdapter};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned HTML per URL; unknown URLs time out.
    struct FakeFetcher {
        pages: HashMap<&'static str, &'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn new(pages: &[(&'static str, &'static str)]) -> Self {
            Self {
                pages: pages.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, url: &str, opts: LoadOptions) -> Result<String, CrawlError> {
            self.calls.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .map(|html| html.to_string())
                .ok_or_else(|| CrawlError::Timeout {
                    url: url.to_string(),
                    secs: opts.timeout.as_secs(),
                })
        }
    }

    const ROADRUN_URL: &str = "http://roadrun.co.kr/schedule/list.php";
    const GORUNNING_URL: &str = "https://gorunning.kr/races/";

    const ROADRUN_HTML: &str = r#"<table>
        <tr><td>03/17</td><td>서울마라톤풀코스</td><td>광화문</td><td>서울시 ☎ 02-1234-5678</td></tr>
        <tr><td>03/17</td><td>서울마라톤풀코스</td><td>광화문</td><td>중복 행</td></tr>
        <tr><td>04/31</td><td>없는날짜런 10km</td><td>부산</td><td></td></tr>
        <tr><td>05/05</td><td>어린이날 마라톤 5km</td><td>잠실</td><td></td></tr>
        </table>"#;

    const GORUNNING_HTML: &str = r#"<main>
        <h3>03월 17일 (화)</h3>
        <div><div class="mb-2"><a href="/races/1/"><p>서울마라톤</p><p>풀코스</p></a></div></div>
        <div><div class="mb-2"><a href="/races/2/"><p>봄맞이 트레일런</p><p>10km</p></a></div></div>
        </main>"#;

    fn adapters() -> Vec<Box<dyn SiteAdapter>> {
        vec![
            Box::new(RoadRunAdapter::new().unwrap()),
            Box::new(GoRunningAdapter::new().unwrap()),
        ]
    }

    fn no_delay() -> CrawlerConfig {
        CrawlerConfig { inter_source_delay_ms: 0, ..CrawlerConfig::default() }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
    }

    #[tokio::test]
    async fn test_merge_across_sources() {
        let fetcher = FakeFetcher::new(&[(ROADRUN_URL, ROADRUN_HTML), (GORUNNING_URL, GORUNNING_HTML)]);
        let outcome = Pipeline::new(&fetcher, &no_delay()).run(&adapters(), today()).await;

        let names: Vec<(&str, &str)> = outcome
            .races
            .iter()
            .map(|r| (r.name.as_str(), r.source.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("서울마라톤", "roadrun.co.kr"),
                ("어린이날 마라톤", "roadrun.co.kr"),
                ("봄맞이 트레일런", "gorunning.kr"),
            ]
        );
        assert_eq!(outcome.cross_source_duplicates, 1);

        let seoul = &outcome.races[0];
        assert_eq!(seoul.date, NaiveDate::from_ymd_opt(2026, 3, 17).unwrap());
        assert_eq!(seoul.distance, "Full");
        assert_eq!(seoul.organizer.as_deref(), Some("서울시"));
        assert_eq!(seoul.phone.as_deref(), Some("02-1234-5678"));

        let roadrun = &outcome.sources[0];
        assert_eq!(roadrun.extracted, 4);
        assert_eq!(roadrun.normalized, 2);
        assert_eq!(roadrun.rejected, 1);
        assert_eq!(roadrun.duplicates, 1);
    }

    #[tokio::test]
    async fn test_unparseable_dates_go_to_review() {
        let fetcher = FakeFetcher::new(&[(ROADRUN_URL, ROADRUN_HTML)]);
        let outcome = Pipeline::new(&fetcher, &no_delay()).run(&adapters(), today()).await;

        assert_eq!(outcome.review.len(), 1);
        assert_eq!(outcome.review[0].reason, RejectReason::UnparseableDate);
        assert_eq!(outcome.review[0].raw.date, "04/31");
        assert_eq!(outcome.review[0].source, "roadrun.co.kr");
    }

    #[tokio::test]
    async fn test_failed_source_does_not_stop_the_run() {
        let fetcher = FakeFetcher::new(&[(GORUNNING_URL, GORUNNING_HTML)]);
        let outcome = Pipeline::new(&fetcher, &no_delay()).run(&adapters(), today()).await;

        assert_eq!(*fetcher.calls.lock().unwrap(), vec![ROADRUN_URL, GORUNNING_URL]);
        assert!(outcome.sources[0].error.as_deref().unwrap().contains("timed out"));
        assert_eq!(outcome.sources[0].normalized, 0);
        assert_eq!(outcome.races.len(), 2);
        assert!(outcome.races.iter().all(|r| r.source == "gorunning.kr"));
    }

    #[tokio::test]
    async fn test_empty_page_is_not_an_error() {
        let fetcher = FakeFetcher::new(&[(ROADRUN_URL, "<html></html>"), (GORUNNING_URL, "<html></html>")]);
        let outcome = Pipeline::new(&fetcher, &no_delay()).run(&adapters(), today()).await;

        assert!(outcome.races.is_empty());
        assert!(outcome.sources.iter().all(|s| s.error.is_none() && s.extracted == 0));
    }
}
