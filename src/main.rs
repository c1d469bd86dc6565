use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use yt_scraper::config::{self, BrowserOptions};
use yt_scraper::db::SqliteLedger;
use yt_scraper::engine::chromium::ChromiumBrowser;
use yt_scraper::engine::Browser;
use yt_scraper::flows::{video, ChannelFlow, VideoFlow};
use yt_scraper::ledger::{FileLedger, Ledger};
use yt_scraper::output::{default_filename, CsvSink, JsonSink};
use yt_scraper::scraper::{Concurrency, Driver, DriverConfig, RunSummary};

#[derive(Parser)]
#[command(name = "yt_scraper", about = "YouTube channel and video scraper via headless Chromium")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LedgerArgs {
    /// Text ledger of processed ids
    #[arg(long, default_value = config::DEFAULT_LEDGER_PATH)]
    ledger: PathBuf,
    /// Keep the ledger in SQLite instead
    #[arg(long, conflicts_with = "ledger")]
    ledger_db: Option<PathBuf>,
}

impl LedgerArgs {
    fn open(&self) -> Result<Box<dyn Ledger>> {
        Ok(match &self.ledger_db {
            Some(path) => Box::new(SqliteLedger::open(path)?),
            None => Box::new(FileLedger::new(&self.ledger)),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape channel about pages into one JSON document
    Channels {
        /// Channel URLs (default: built-in list)
        urls: Vec<String>,
        /// Output file (default: channel_data_<timestamp>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Channels scraped in parallel (default: all at once)
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
    /// Scrape videos one after another, appending rows to a CSV
    Videos {
        /// Video ids or watch URLs (default: built-in list)
        ids: Vec<String>,
        /// Output file (default: video_data_<timestamp>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[command(flatten)]
        ledger: LedgerArgs,
    },
    /// Show what the ledger has recorded
    Processed {
        #[command(flatten)]
        ledger: LedgerArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Channels {
            urls,
            output,
            concurrency,
        } => {
            let seeds = if urls.is_empty() {
                config::default_channels()
            } else {
                urls
            };
            let path = output
                .unwrap_or_else(|| default_filename(config::CHANNEL_OUTPUT_PREFIX, "json"));
            let limit = concurrency.unwrap_or(seeds.len());

            let browser = launch().await?;
            let mut sink = JsonSink::new(path);
            let mut driver = Driver::new(
                browser.clone(),
                ChannelFlow::new(),
                DriverConfig::new(Concurrency::FanOut { limit }),
            );
            let summary = driver.run(&seeds, &mut sink).await;
            shutdown(browser.as_ref()).await;
            summary.map(|s| print_summary(&s))
        }
        Commands::Videos { ids, output, ledger } => {
            let seeds = if ids.is_empty() {
                config::default_videos()
            } else {
                ids.iter().map(|id| video::video_id(id)).collect()
            };
            let path =
                output.unwrap_or_else(|| default_filename(config::VIDEO_OUTPUT_PREFIX, "csv"));
            let ledger = ledger.open()?;

            let processed = ledger.processed_set()?;
            if seeds.iter().all(|id| processed.contains(id)) {
                println!("All videos have already been processed!");
                return Ok(());
            }

            let flow = VideoFlow::new();
            let mut sink = CsvSink::open(&path, Some(flow.schema()))?;
            let browser = launch().await?;
            let mut driver = Driver::new(
                browser.clone(),
                flow,
                DriverConfig::new(Concurrency::Serial),
            )
            .with_ledger(ledger);
            let summary = driver.run(&seeds, &mut sink).await;
            shutdown(browser.as_ref()).await;
            summary.map(|s| print_summary(&s))
        }
        Commands::Processed { ledger } => {
            let ledger = ledger.open()?;
            let entries = ledger.entries()?;
            let unique = ledger.processed_set()?.len();
            println!("Ledger:    {}", ledger.location());
            println!("Entries:   {}", entries.len());
            println!("Unique:    {}", unique);
            if let Some(last) = entries.last() {
                println!("Latest:    {} at {}", last.identifier, last.completed_at);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn launch() -> Result<Arc<dyn Browser>> {
    let browser: Arc<dyn Browser> =
        Arc::new(ChromiumBrowser::launch(&BrowserOptions::from_env()).await?);
    Ok(browser)
}

async fn shutdown(browser: &dyn Browser) {
    if let Err(e) = browser.close().await {
        tracing::warn!("Failed to close browser: {}", e);
    }
}

fn print_summary(s: &RunSummary) {
    println!(
        "Done: {} items ({} processed, {} skipped, {} already done).",
        s.total, s.processed, s.skipped, s.already_done
    );
    if let Some(path) = &s.output {
        println!("Data saved to {}", path.display());
    }
    if let Some(ledger) = &s.ledger {
        println!("Ledger: {}", ledger);
    }
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
