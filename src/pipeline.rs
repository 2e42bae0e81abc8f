// src/pipeline.rs

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

use crate::batch::{self, BatchOptions, EntityFailure};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::fetch::{PageFetcher, RetryPolicy, SessionFactory};
use crate::process::{self, Datasets, LongTable, WideTable};

/// Everything one run produces.
#[derive(Debug)]
pub struct RunOutput {
    pub datasets: Datasets,
    pub failures: Vec<EntityFailure>,
    pub entity_count: usize,
}

/// Index scrape plus the per-entity fetch → extract → reshape pipeline.
pub struct Scraper {
    config: Config,
    fetcher: PageFetcher,
}

impl Scraper {
    pub fn new(config: Config, factory: Arc<dyn SessionFactory>) -> Result<Self> {
        config.validate()?;
        let fetcher = PageFetcher::new(
            factory,
            RetryPolicy {
                interval: config.retry_interval(),
                max_retries: config.max_retries,
            },
        );
        Ok(Self { config, fetcher })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Constituent symbols from the index page, in page order.
    #[instrument(level = "info", skip(self), fields(url = %self.config.index_url))]
    pub fn companies(&self) -> Result<Vec<String>> {
        let index = &self.config.index;
        let html = self
            .fetcher
            .fetch(&self.config.index_url, index.marker.as_deref())?;
        let table = process::extract(&html, &index.selectors, &self.config.statement.value_prefix)?;

        let col = match &index.symbol_column {
            Some(name) => table.column_index(name).ok_or_else(|| {
                PipelineError::ExtractionShape(format!(
                    "index table has no `{}` column: {:?}",
                    name, table.headers
                ))
            })?,
            None => 0,
        };

        let symbols: Vec<String> = table
            .column(col)
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if symbols.is_empty() {
            return Err(PipelineError::ExtractionShape(
                "index table lists no constituents".into(),
            ));
        }
        info!(count = symbols.len(), "found constituents");
        Ok(symbols)
    }

    /// Scrape one entity's statement into long records.
    #[instrument(level = "info", skip(self))]
    pub fn entity(&self, symbol: &str) -> Result<LongTable> {
        let start = Instant::now();
        let page = &self.config.statement;
        let url = self.config.entity_url(symbol);

        let html = self.fetcher.fetch(&url, page.marker.as_deref())?;
        let raw = process::extract(&html, &page.selectors, &page.value_prefix)?;
        let wide = WideTable::from_raw(
            symbol,
            &raw,
            &page.id_column,
            &page.value_prefix,
            page.current_column,
        )?;
        let long = process::reshape(&wide, &page.id_column, &page.value_prefix)?;

        info!(rows = long.len(), elapsed = ?start.elapsed(), "scraped");
        Ok(long)
    }

    /// Run the batch pipeline over `symbols` and clean the result.
    pub fn run_for(&self, symbols: &[String]) -> Result<RunOutput> {
        let opts = BatchOptions {
            worker_count: self.config.worker_count,
            batch_size: self.config.batch_size,
            policy: self.config.failure_policy,
        };
        let outcome = batch::run(symbols, &opts, |s| self.entity(s))?;
        let datasets = process::clean(&outcome.table)?;

        info!(
            entities = symbols.len(),
            failed = outcome.failures.len(),
            historical = datasets.historical.len(),
            current = datasets.current.len(),
            "run complete"
        );
        Ok(RunOutput {
            datasets,
            failures: outcome.failures,
            entity_count: symbols.len(),
        })
    }

    /// Index page → constituents → statements → cleaned datasets.
    /// A failure on the index page aborts the run.
    pub fn run(&self) -> Result<RunOutput> {
        let symbols = self.companies()?;
        self.run_for(&symbols)
    }
}
