mod browser;
mod crawler;
mod db;
mod dedup;
mod extract;
mod model;
mod normalize;
mod page;
mod robots;
mod sink;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use url::Url;

#[derive(Parser)]
#[command(
    name = "daraz_scraper",
    about = "Daraz category product scraper via headless Chrome"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a category's pagination and export products as CSV
    Crawl(CrawlArgs),
    /// Show crawl ledger statistics
    Stats {
        #[arg(short = 'o', long, default_value = "output_data")]
        output_dir: PathBuf,
    },
}

#[derive(Args)]
struct CrawlArgs {
    /// Category URL, e.g. https://www.daraz.pk/washers-dryers/
    category_url: String,
    /// Directory for the CSV, screenshot, log and ledger
    #[arg(short = 'o', long, default_value = "output_data")]
    output_dir: PathBuf,
    /// Max pages to traverse (default: until pagination ends)
    #[arg(short = 'n', long)]
    max_pages: Option<usize>,
    /// Seed the dedup filter with urls emitted by earlier runs
    #[arg(long)]
    resume: bool,
    /// Run Chrome with a visible window
    #[arg(long)]
    no_headless: bool,
    /// Skip the robots.txt check
    #[arg(long)]
    ignore_robots: bool,
    /// Load images and stylesheets instead of blocking them
    #[arg(long)]
    no_block_assets: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Crawl(args) => crawl(args).await,
        Commands::Stats { output_dir } => stats(&output_dir),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn crawl(args: CrawlArgs) -> Result<()> {
    let category = Url::parse(&args.category_url).context("invalid category URL")?;
    anyhow::ensure!(
        category.scheme() == "http" || category.scheme() == "https",
        "category URL must be http(s): {category}"
    );

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;
    let _log_guard = init_logging(&args.output_dir);
    println!("Category Url:\t{category}");

    if !args.ignore_robots {
        check_robots(&category).await?;
    }

    let conn = db::connect(&args.output_dir)?;
    db::init_schema(&conn)?;

    let mut dedup = dedup::DedupFilter::new();
    if args.resume {
        let seen = db::load_seen(&conn)?;
        info!("Resuming with {} previously seen urls", seen.len());
        dedup.preload(seen);
    }

    let opts = browser::BrowserOptions {
        headless: !args.no_headless,
        block_assets: !args.no_block_assets,
    };
    let session = browser::BrowserSession::launch(&opts).await?;
    let page = match session.open_category(category.as_str(), &opts).await {
        Ok(page) => page,
        Err(e) => {
            let _ = session.shutdown().await;
            return Err(e);
        }
    };

    let mut sink = sink::CsvSink::create(&args.output_dir.join("products.csv"))?;
    let run_id = db::start_run(&conn, category.as_str())?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing current page...");
            signal_token.cancel();
        }
    });

    let config = crawler::CrawlConfig {
        output_dir: args.output_dir.clone(),
        max_pages: args.max_pages,
    };
    let outcome = crawler::run(page, &mut dedup, &mut sink, &conn, run_id, &config, &shutdown).await;

    if let Err(e) = session.shutdown().await {
        warn!("Browser shutdown failed: {e:#}");
    }

    match outcome {
        Ok(s) => {
            db::finish_run(&conn, run_id, s.pages, s.emitted, s.skipped(), None)?;
            println!(
                "Crawled {} pages: {} products emitted ({} duplicates, {} missing url, {} price errors).",
                s.pages, s.emitted, s.duplicates, s.missing_url, s.price_errors
            );
            Ok(())
        }
        Err(e) => {
            db::finish_run(&conn, run_id, 0, 0, 0, Some(&format!("{e:#}")))?;
            Err(e)
        }
    }
}

async fn check_robots(category: &Url) -> Result<()> {
    let client = reqwest::Client::new();
    match robots::fetch_rules(&client, category).await {
        Ok(rules) => {
            anyhow::ensure!(
                rules.is_allowed(category.path()),
                "robots.txt disallows crawling {}",
                category.path()
            );
            Ok(())
        }
        Err(e) => {
            // Unreachable robots.txt is not a crawl blocker; the
            // navigation itself will surface a dead site.
            warn!("Could not fetch robots.txt ({e:#}), continuing");
            Ok(())
        }
    }
}

fn stats(output_dir: &Path) -> Result<()> {
    let conn = db::connect(output_dir)?;
    db::init_schema(&conn)?;
    let s = db::get_stats(&conn)?;
    println!("Runs:      {} ({} completed)", s.runs, s.completed_runs);
    println!("Pages:     {}", s.pages);
    println!("Products:  {}", s.products);
    Ok(())
}

fn init_logging(output_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    let file = tracing_appender::rolling::never(output_dir, "info.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();
    guard
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
