use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tracing::{debug, warn};

use crate::page::{CategoryPage, NavigationError, NextControl};

/// Bounded wait on navigation and settle operations.
pub const NAV_TIMEOUT: Duration = Duration::from_secs(30);
/// Pause after a next-page click before waiting for the load state;
/// doubles as the politeness delay between page fetches.
pub const SETTLE_DELAY: Duration = Duration::from_millis(500);

const NAV_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;

const NEXT_SELECTOR: &str = "li[title='Next Page']";

// Product grid tiles, inner HTML in DOM order.
const TILES_JS: &str =
    "Array.from(document.querySelectorAll(\"div[data-spm='sku'] > div\")).map(el => el.innerHTML)";

// null = no control, true/false = aria-disabled state.
const NEXT_STATE_JS: &str = "(() => { \
        const el = document.querySelector(\"li[title='Next Page']\"); \
        if (!el) return null; \
        return el.getAttribute('aria-disabled') === 'true'; \
    })()";

// Non-essential sub-resources, dropped to cut bandwidth.
const BLOCKED_URL_PATTERNS: &[&str] =
    &["*.jpg", "*.jpeg", "*.png", "*.gif", "*.webp", "*.css"];

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub block_assets: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            block_assets: true,
        }
    }
}

/// A running Chrome instance plus the task draining its event stream.
pub struct BrowserSession {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
}

impl BrowserSession {
    pub async fn launch(opts: &BrowserOptions) -> Result<Self> {
        let mut config = BrowserConfig::builder();
        if !opts.headless {
            config = config.with_head();
        }
        let config = config
            .build()
            .map_err(|e| anyhow::anyhow!("browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("launching headless Chrome")?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
        })
    }

    /// Open the category URL in a fresh page, with retries and backoff
    /// on the initial navigation.
    pub async fn open_category(&self, url: &str, opts: &BrowserOptions) -> Result<DarazPage> {
        let page = self.browser.new_page("about:blank").await?;
        page.execute(EnableParams::default()).await?;
        if opts.block_assets {
            page.execute(SetBlockedUrLsParams {
                urls: BLOCKED_URL_PATTERNS.iter().map(|p| p.to_string()).collect(),
            })
            .await?;
        }

        goto_with_retry(&page, url).await?;
        let current = page.url().await?.unwrap_or_else(|| url.to_string());
        Ok(DarazPage { page, url: current })
    }

    pub async fn shutdown(mut self) -> Result<()> {
        self.browser.close().await?;
        self.browser.wait().await?;
        self.handler_task.abort();
        Ok(())
    }
}

async fn goto_with_retry(page: &Page, url: &str) -> Result<()> {
    for attempt in 0..=NAV_RETRIES {
        let nav = async {
            page.goto(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, CdpError>(())
        };
        let failure = match tokio::time::timeout(NAV_TIMEOUT, nav).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {NAV_TIMEOUT:?}"),
        };
        if attempt == NAV_RETRIES {
            anyhow::bail!("navigation to {url} failed: {failure}");
        }
        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Navigation to {} failed ({}), retrying in {:.1}s (attempt {}/{})",
            url,
            failure,
            backoff.as_secs_f64(),
            attempt + 1,
            NAV_RETRIES
        );
        tokio::time::sleep(backoff).await;
    }
    unreachable!("retry loop returns or bails")
}

/// Live rendered category page backed by a Chrome tab.
pub struct DarazPage {
    page: Page,
    url: String,
}

#[async_trait]
impl CategoryPage for DarazPage {
    fn current_url(&self) -> String {
        self.url.clone()
    }

    async fn product_tiles(&mut self) -> Result<Vec<String>> {
        let tiles: Vec<String> = self
            .page
            .evaluate(TILES_JS)
            .await?
            .into_value()
            .context("reading product tiles")?;
        Ok(tiles)
    }

    async fn next_control(&mut self) -> Result<Option<NextControl>> {
        let state: Option<bool> = self
            .page
            .evaluate(NEXT_STATE_JS)
            .await?
            .into_value()
            .context("reading next-page control state")?;
        Ok(state.map(|disabled| NextControl { disabled }))
    }

    async fn activate_next(&mut self) -> Result<(), NavigationError> {
        let click = async {
            let control = self.page.find_element(NEXT_SELECTOR).await?;
            control.click().await?;
            Ok::<_, CdpError>(())
        };
        match tokio::time::timeout(NAV_TIMEOUT, click).await {
            Err(_) => return Err(NavigationError::Timeout(NAV_TIMEOUT)),
            Ok(Err(e)) if is_detached(&e) => return Err(NavigationError::Detached),
            Ok(Err(e)) => return Err(NavigationError::Renderer(e.into())),
            Ok(Ok(())) => {}
        }

        tokio::time::sleep(SETTLE_DELAY).await;
        match tokio::time::timeout(NAV_TIMEOUT, self.page.wait_for_navigation()).await {
            Err(_) => return Err(NavigationError::Timeout(NAV_TIMEOUT)),
            Ok(Err(e)) => return Err(NavigationError::Renderer(e.into())),
            Ok(Ok(_)) => {}
        }

        if let Ok(Some(url)) = self.page.url().await {
            debug!(from = %self.url, to = %url, "Advanced to next page");
            self.url = url;
        }
        Ok(())
    }

    async fn screenshot(&mut self, path: &Path) -> Result<()> {
        self.page
            .save_screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
                path,
            )
            .await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.page.clone().close().await?;
        Ok(())
    }
}

/// The renderer's stale-element failures, translated once, here at the
/// boundary; the rest of the crate only matches the typed variant. A
/// control that disappeared between the state read and the click also
/// lands here (the lookup no longer finds it).
fn is_detached(err: &CdpError) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("not attached")
        || msg.contains("node with given id")
        || msg.contains("could not find node")
        || msg.contains("element not found")
}
