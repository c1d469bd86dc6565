use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::ITEM_TIMEOUT;
use crate::engine::{Browser, Page};
use crate::ledger::{pending, Ledger};
use crate::output::Sink;
use crate::record::Record;

/// Element that must render before a page counts as loaded.
#[derive(Debug, Clone)]
pub struct Readiness {
    pub selector: String,
    pub timeout: Duration,
}

/// One concrete scrape pipeline: how to reach an item and what to pull off it.
#[async_trait]
pub trait Flow: Send + Sync + 'static {
    fn url_for(&self, id: &str) -> String;

    fn readiness(&self) -> Readiness;

    /// Extracts and assembles the record for an already-loaded page.
    async fn extract(&self, page: &dyn Page, url: &str) -> Result<Record>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concurrency {
    /// One browsing context per item, at most `limit` in flight.
    FanOut { limit: usize },
    /// One context and page reused for every item, in order.
    Serial,
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub concurrency: Concurrency,
    pub item_timeout: Duration,
}

impl DriverConfig {
    pub fn new(concurrency: Concurrency) -> Self {
        Self {
            concurrency,
            item_timeout: ITEM_TIMEOUT,
        }
    }
}

/// Run stats returned after completion.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub total: usize,
    pub already_done: usize,
    pub processed: usize,
    pub skipped: usize,
    pub output: Option<PathBuf>,
    pub ledger: Option<String>,
}

pub struct Driver<F: Flow> {
    browser: Arc<dyn Browser>,
    flow: Arc<F>,
    config: DriverConfig,
    ledger: Option<Box<dyn Ledger>>,
}

impl<F: Flow> Driver<F> {
    pub fn new(browser: Arc<dyn Browser>, flow: F, config: DriverConfig) -> Self {
        Self {
            browser,
            flow: Arc::new(flow),
            config,
            ledger: None,
        }
    }

    pub fn with_ledger(mut self, ledger: Box<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Drives every unprocessed seed through navigate → wait → extract →
    /// persist → mark. Item failures are logged and skipped; sink and ledger
    /// failures end the run.
    pub async fn run(&mut self, seeds: &[String], sink: &mut dyn Sink) -> Result<RunSummary> {
        let processed = match &self.ledger {
            Some(ledger) => ledger.processed_set()?,
            None => Default::default(),
        };
        let todo = pending(seeds, &processed);

        let mut summary = RunSummary {
            total: seeds.len(),
            already_done: seeds.iter().filter(|id| processed.contains(*id)).count(),
            ledger: self.ledger.as_ref().map(|l| l.location()),
            ..Default::default()
        };
        if todo.is_empty() {
            info!("All {} items have already been processed", seeds.len());
            return Ok(summary);
        }
        info!(
            "{} items to process ({} already done)",
            todo.len(),
            summary.already_done
        );

        let pb = ProgressBar::new(todo.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        let mut deferred = Vec::new();
        let outcome = match self.config.concurrency {
            Concurrency::Serial => {
                self.run_serial(&todo, sink, &pb, &mut summary, &mut deferred)
                    .await
            }
            Concurrency::FanOut { limit } => {
                self.run_fan_out(todo, limit, sink, &pb, &mut summary, &mut deferred)
                    .await
            }
        };
        if let Err(e) = outcome {
            pb.abandon();
            return Err(e);
        }
        pb.finish_and_clear();

        summary.output = sink.finish()?;
        if let Some(ledger) = self.ledger.as_mut() {
            for id in &deferred {
                ledger.mark_done(id)?;
            }
        }

        info!(
            "Processed {} items ({} skipped)",
            summary.processed, summary.skipped
        );
        Ok(summary)
    }

    async fn run_serial(
        &mut self,
        todo: &[String],
        sink: &mut dyn Sink,
        pb: &ProgressBar,
        summary: &mut RunSummary,
        deferred: &mut Vec<String>,
    ) -> Result<()> {
        let context = self
            .browser
            .new_context()
            .await
            .context("Failed to open browsing context")?;
        let page = context.new_page().await.context("Failed to open page")?;

        let mut result = Ok(());
        for id in todo {
            let url = self.flow.url_for(id);
            info!("Processing {}", url);
            let outcome = process_item(&*self.flow, &*page, &url, self.config.item_timeout).await;
            if let Err(e) = self.settle(id, outcome, sink, summary, deferred) {
                result = Err(e);
                break;
            }
            pb.inc(1);
        }

        if let Err(e) = page.close().await {
            debug!("Closing page: {}", e);
        }
        if let Err(e) = context.close().await {
            debug!("Closing context: {}", e);
        }
        result
    }

    async fn run_fan_out(
        &mut self,
        todo: Vec<String>,
        limit: usize,
        sink: &mut dyn Sink,
        pb: &ProgressBar,
        summary: &mut RunSummary,
        deferred: &mut Vec<String>,
    ) -> Result<()> {
        let limit = limit.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));

        // Channel: workers send results, this loop is the only writer
        let (tx, mut rx) = tokio::sync::mpsc::channel::<(String, Result<Record>)>(limit * 2);
        let mut workers = JoinSet::new();

        for id in todo {
            let browser = Arc::clone(&self.browser);
            let flow = Arc::clone(&self.flow);
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();
            let item_timeout = self.config.item_timeout;

            workers.spawn(async move {
                let outcome = match sem.acquire().await {
                    Ok(_permit) => scrape_isolated(browser.as_ref(), flow.as_ref(), &id, item_timeout).await,
                    Err(e) => Err(e.into()),
                };
                let _ = tx.send((id, outcome)).await;
            });
        }

        // Drop our copy of tx so rx closes when all spawned tasks finish
        drop(tx);

        while let Some((id, outcome)) = rx.recv().await {
            if let Err(e) = self.settle(&id, outcome, sink, summary, deferred) {
                warn!("Aborting {} in-flight workers", workers.len());
                workers.abort_all();
                return Err(e);
            }
            pb.inc(1);
        }
        while workers.join_next().await.is_some() {}
        Ok(())
    }

    /// Persists a finished item and marks it done, or logs and skips a failed one.
    fn settle(
        &mut self,
        id: &str,
        outcome: Result<Record>,
        sink: &mut dyn Sink,
        summary: &mut RunSummary,
        deferred: &mut Vec<String>,
    ) -> Result<()> {
        let record = match outcome {
            Ok(record) => record,
            Err(e) => {
                warn!("Error processing {}: {:#}", id, e);
                summary.skipped += 1;
                return Ok(());
            }
        };

        sink.persist(record)?;
        summary.processed += 1;
        match self.ledger.as_mut() {
            Some(ledger) if sink.persists_per_record() => {
                ledger.mark_done(id)?;
                debug!("{} marked as processed", id);
            }
            Some(_) => deferred.push(id.to_string()),
            None => {}
        }
        Ok(())
    }
}

/// One item in its own browsing context, torn down afterwards.
async fn scrape_isolated<F: Flow>(
    browser: &dyn Browser,
    flow: &F,
    id: &str,
    item_timeout: Duration,
) -> Result<Record> {
    let context = browser.new_context().await?;
    let outcome = match context.new_page().await {
        Ok(page) => {
            let url = flow.url_for(id);
            info!("Processing {}", url);
            let outcome = process_item(flow, &*page, &url, item_timeout).await;
            if let Err(e) = page.close().await {
                debug!("Closing page for {}: {}", id, e);
            }
            outcome
        }
        Err(e) => Err(e.into()),
    };
    if let Err(e) = context.close().await {
        debug!("Closing context for {}: {}", id, e);
    }
    outcome
}

async fn process_item<F: Flow>(
    flow: &F,
    page: &dyn Page,
    url: &str,
    item_timeout: Duration,
) -> Result<Record> {
    let readiness = flow.readiness();
    let work = async {
        page.goto(url).await?;
        page.wait_for_selector(&readiness.selector, readiness.timeout)
            .await?;
        flow.extract(page, url).await
    };
    tokio::time::timeout(item_timeout, work)
        .await
        .map_err(|_| anyhow!("gave up on {} after {:?}", url, item_timeout))?
}

// ── Tests ──
