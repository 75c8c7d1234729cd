//! Headless Chrome page loading via chromiumoxide.

use crate::config::CrawlerConfig;
use crate::error::CrawlError;
use crate::scraper::LoadOptions;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Anything that can turn a URL into rendered HTML.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, opts: LoadOptions) -> Result<String, CrawlError>;
}

/// One browser per run; one tab per fetch, always closed afterwards.
pub struct BrowserFetcher {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserFetcher {
    pub async fn launch(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", config.user_agent))
            .window_size(1920, 1080);

        if let Some(path) = &config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        let browser_config = builder.build().map_err(CrawlError::BrowserLaunch)?;

        let (browser, mut events) = Browser::launch(browser_config)
            .await
            .map_err(|e| CrawlError::BrowserLaunch(e.to_string()))?;

        // The CDP event loop must be polled for the browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!("browser event error: {}", e);
                }
            }
        });

        Ok(Self { browser, handler })
    }

    async fn render(page: &Page, url: &str, opts: LoadOptions) -> Result<String, CrawlError> {
        let load_err = |e: chromiumoxide::error::CdpError| CrawlError::PageLoad {
            url: url.to_string(),
            message: e.to_string(),
        };

        let navigate = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<(), chromiumoxide::error::CdpError>(())
        };

        tokio::time::timeout(opts.timeout, navigate)
            .await
            .map_err(|_| CrawlError::Timeout {
                url: url.to_string(),
                secs: opts.timeout.as_secs(),
            })?
            .map_err(load_err)?;

        // Lazy-loaded listings fill in after the load event.
        tokio::time::sleep(opts.settle).await;

        page.content().await.map_err(load_err)
    }

    /// Close the browser and stop the event loop.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("browser close failed: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            debug!("browser process wait failed: {}", e);
        }
        self.handler.abort();
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str, opts: LoadOptions) -> Result<String, CrawlError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CrawlError::PageLoad {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let result = Self::render(&page, url, opts).await;

        if let Err(e) = page.close().await {
            warn!("failed to close tab for {}: {}", url, e);
        }

        result
    }
}

impl Drop for BrowserFetcher {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
