pub mod browser;
pub mod cleaner;
pub mod parsers;

use crate::error::CrawlError;
use crate::models::RawRace;
use std::time::Duration;
use url::Url;

pub use browser::{BrowserFetcher, PageFetcher};

// ── Site adapter trait ────────────────────────────────────────────────────────

/// How long to wait for a page and how long to let lazy content settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub timeout: Duration,
    pub settle: Duration,
}

/// One external race-listing site: where it lives and how to read it.
pub trait SiteAdapter: Send + Sync {
    /// Tag stored on every record, e.g. "roadrun.co.kr".
    fn source(&self) -> &'static str;

    fn url(&self) -> &Url;

    fn load_options(&self) -> LoadOptions;

    fn extract(&self, html: &str) -> Result<Vec<RawRace>, CrawlError>;
}

// ── roadrun.co.kr ─────────────────────────────────────────────────────────────

/// 마라톤온라인 schedule, a plain table of upcoming races.
pub struct RoadRunAdapter {
    url: Url,
}

impl RoadRunAdapter {
    pub const SOURCE: &'static str = "roadrun.co.kr";
    const LIST_URL: &'static str = "http://roadrun.co.kr/schedule/list.php";

    pub fn new() -> Result<Self, url::ParseError> {
        Ok(Self { url: Url::parse(Self::LIST_URL)? })
    }
}

impl SiteAdapter for RoadRunAdapter {
    fn source(&self) -> &'static str {
        Self::SOURCE
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            timeout: Duration::from_secs(30),
            settle: Duration::from_secs(2),
        }
    }

    fn extract(&self, html: &str) -> Result<Vec<RawRace>, CrawlError> {
        parsers::parse_schedule_table(html, &self.url)
    }
}

// ── gorunning.kr ──────────────────────────────────────────────────────────────

/// 고러닝 race list, cards grouped under "01월 18일" headers.
pub struct GoRunningAdapter {
    url: Url,
}

impl GoRunningAdapter {
    pub const SOURCE: &'static str = "gorunning.kr";
    const LIST_URL: &'static str = "https://gorunning.kr/races/";

    pub fn new() -> Result<Self, url::ParseError> {
        Ok(Self { url: Url::parse(Self::LIST_URL)? })
    }
}

impl SiteAdapter for GoRunningAdapter {
    fn source(&self) -> &'static str {
        Self::SOURCE
    }

    fn url(&self) -> &Url {
        &self.url
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            timeout: Duration::from_secs(60),
            settle: Duration::from_secs(5),
        }
    }

    fn extract(&self, html: &str) -> Result<Vec<RawRace>, CrawlError> {
        parsers::parse_grouped_cards(html, &self.url)
    }
}

// ── Source selection ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SourceSelection {
    All,
    Roadrun,
    Gorunning,
}

impl SourceSelection {
    /// Tag used in export file names.
    pub fn tag(self) -> &'static str {
        match self {
            SourceSelection::All => "all",
            SourceSelection::Roadrun => "roadrun",
            SourceSelection::Gorunning => "gorunning",
        }
    }

    /// Adapters in crawl order. Order decides which copy survives dedup.
    pub fn adapters(self) -> Result<Vec<Box<dyn SiteAdapter>>, url::ParseError> {
        let mut adapters: Vec<Box<dyn SiteAdapter>> = Vec::new();
        if matches!(self, SourceSelection::All | SourceSelection::Roadrun) {
            adapters.push(Box::new(RoadRunAdapter::new()?));
        }
        if matches!(self, SourceSelection::All | SourceSelection::Gorunning) {
            adapters.push(Box::new(GoRunningAdapter::new()?));
        }
        Ok(adapters)
    }
}
