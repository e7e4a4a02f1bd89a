use std::path::{Path, PathBuf};

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::db;
use crate::dedup::{DedupFilter, Rejection};
use crate::extract;
use crate::model::RawProduct;
use crate::normalize;
use crate::page::{CategoryPage, NavigationError};
use crate::sink::CsvSink;

pub struct CrawlConfig {
    pub output_dir: PathBuf,
    pub max_pages: Option<usize>,
}

/// Counters for the end-of-run summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub pages: usize,
    pub extracted: usize,
    pub emitted: usize,
    pub duplicates: usize,
    pub missing_url: usize,
    pub price_errors: usize,
}

impl CrawlStats {
    pub fn skipped(&self) -> usize {
        self.duplicates + self.missing_url
    }
}

/// Drive a full category traversal and release the page afterwards.
///
/// The page handle is closed on every exit path, including fatal
/// navigation failures and cancellation.
pub async fn run<P: CategoryPage>(
    mut page: P,
    dedup: &mut DedupFilter,
    sink: &mut CsvSink,
    conn: &Connection,
    run_id: i64,
    config: &CrawlConfig,
    shutdown: &CancellationToken,
) -> Result<CrawlStats> {
    let result = traverse(&mut page, dedup, sink, conn, run_id, config, shutdown).await;
    if let Err(e) = page.close().await {
        warn!("Failed to close page: {e:#}");
    }
    result
}

async fn traverse<P: CategoryPage>(
    page: &mut P,
    dedup: &mut DedupFilter,
    sink: &mut CsvSink,
    conn: &Connection,
    run_id: i64,
    config: &CrawlConfig,
    shutdown: &CancellationToken,
) -> Result<CrawlStats> {
    let mut stats = CrawlStats::default();
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);

    loop {
        if shutdown.is_cancelled() {
            info!("Shutdown requested, stopping after {} pages", stats.pages);
            break;
        }

        let page_url = page.current_url();
        let tiles = page.product_tiles().await?;
        info!(page = %page_url, products = tiles.len(), "Scraping page");

        let mut emitted_urls = Vec::new();
        for html in &tiles {
            stats.extracted += 1;
            let raw = extract::parse_tile(html, &page_url);
            if let Some(url) = process_record(raw, dedup, sink, &mut stats)? {
                emitted_urls.push(url);
            }
        }

        stats.pages += 1;
        db::record_page(conn, run_id, &page_url, tiles.len(), &emitted_urls)?;
        pb.set_message(format!(
            "page {} · {} products emitted",
            stats.pages, stats.emitted
        ));

        if let Some(max) = config.max_pages {
            if stats.pages >= max {
                info!("Reached page limit ({max}), stopping");
                break;
            }
        }

        match page.next_control().await? {
            None => {
                info!("No next-page control found. Quitting...");
                capture_final_page(page, &config.output_dir).await;
                break;
            }
            Some(control) if control.disabled => {
                info!("Next-page control disabled. Quitting...");
                capture_final_page(page, &config.output_dir).await;
                break;
            }
            Some(_) => match page.activate_next().await {
                Ok(()) => {}
                // The control vanished between the state read and the
                // click: end of pagination, not a failure.
                Err(NavigationError::Detached) => {
                    info!("Next-page control detached. Quitting...");
                    break;
                }
                Err(e) => return Err(e.into()),
            },
        }
    }

    pb.finish_and_clear();
    Ok(stats)
}

/// One record through the pipeline: dedup gate on the completed URL,
/// then normalize, then emit. Per-record failures are logged and
/// skipped; only sink/I-O errors propagate.
fn process_record(
    raw: RawProduct,
    dedup: &mut DedupFilter,
    sink: &mut CsvSink,
    stats: &mut CrawlStats,
) -> Result<Option<String>> {
    let canonical_url = raw.url.as_deref().map(normalize::complete_url);
    match dedup.admit(canonical_url.as_deref()) {
        Err(Rejection::MissingUrl) => {
            stats.missing_url += 1;
            debug!(page = %raw.page_url, "Dropping record without url");
            return Ok(None);
        }
        Err(Rejection::Duplicate) => {
            stats.duplicates += 1;
            debug!(url = canonical_url.as_deref().unwrap_or(""), "Duplicate url, dropping");
            return Ok(None);
        }
        Ok(()) => {}
    }

    let normalized = match normalize::normalize(raw) {
        Ok(n) => n,
        Err(e) => {
            stats.price_errors += 1;
            warn!("Dropping record: {e}");
            return Ok(None);
        }
    };
    for e in &normalized.price_errors {
        stats.price_errors += 1;
        warn!(url = %normalized.product.url, "{e}");
    }

    sink.write(&normalized.product)?;
    stats.emitted += 1;
    Ok(Some(normalized.product.url))
}

/// Best-effort terminal artifact. Capture failure never fails the
/// traversal.
async fn capture_final_page<P: CategoryPage>(page: &mut P, output_dir: &Path) {
    let name = format!(
        "screenshot_{}.png",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let path = output_dir.join(name);
    match page.screenshot(&path).await {
        Ok(()) => info!("Final page captured to {}", path.display()),
        Err(e) => warn!("Failed to capture final page: {e:#}"),
    }
}

// ── Tests ──
