use thiserror::Error;

/// Failures while loading or extracting a source page.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("failed to load {url}: {message}")]
    PageLoad { url: String, message: String },

    #[error("timed out after {secs}s loading {url}")]
    Timeout { url: String, secs: u64 },

    #[error("invalid selector {0}")]
    Selector(String),
}

/// Failures talking to the `races` store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("duckdb: {0}")]
    Db(#[from] duckdb::Error),

    #[error("invalid store url: {0}")]
    Url(#[from] url::ParseError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("store connection lock poisoned")]
    Poisoned,
}
