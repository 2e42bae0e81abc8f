// src/batch.rs
//! Fan the per-entity pipeline out over a bounded worker pool.

use rayon::prelude::*;
use serde::Serialize;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::config::FailurePolicy;
use crate::error::{PipelineError, Result};
use crate::process::LongTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    pub worker_count: usize,
    pub batch_size: usize,
    pub policy: FailurePolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityFailure {
    pub entity: String,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub table: LongTable,
    pub failures: Vec<EntityFailure>,
}

/// Contiguous slices of at most `batch_size` items; `ceil(N / batch_size)` of them.
pub fn partition<T>(items: &[T], batch_size: usize) -> Vec<&[T]> {
    items.chunks(batch_size.max(1)).collect()
}

/// Run `pipeline` for every id, one batch at a time.
///
/// Results are concatenated in input order regardless of completion
/// order. Each batch finishes completely before the next is submitted.
#[instrument(level = "info", skip_all, fields(entities = ids.len()))]
pub fn run<F>(ids: &[String], opts: &BatchOptions, pipeline: F) -> Result<BatchOutcome>
where
    F: Fn(&str) -> Result<LongTable> + Sync,
{
    if opts.worker_count == 0 || opts.batch_size == 0 {
        return Err(PipelineError::Config(format!(
            "worker_count ({}) and batch_size ({}) must be at least 1",
            opts.worker_count, opts.batch_size
        )));
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.worker_count)
        .thread_name(|i| format!("scrape-worker-{}", i))
        .build()
        .map_err(|e| PipelineError::Config(format!("building worker pool: {}", e)))?;

    let batches = partition(ids, opts.batch_size);
    let total = batches.len();
    let mut tables = Vec::with_capacity(ids.len());
    let mut failures = Vec::new();

    for (n, batch) in batches.into_iter().enumerate() {
        let start = Instant::now();
        let results: Vec<(&String, Result<LongTable>)> =
            pool.install(|| batch.par_iter().map(|id| (id, pipeline(id.as_str()))).collect());

        for (id, res) in results {
            match res {
                Ok(table) => tables.push(table),
                Err(e) if opts.policy == FailurePolicy::FailFast => {
                    error!(entity = %id, error = %e, "entity failed, aborting run");
                    return Err(e);
                }
                Err(e) => {
                    warn!(entity = %id, error = %e, "entity failed, skipping");
                    failures.push(EntityFailure {
                        entity: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }
        info!(batch = n + 1, of = total, elapsed = ?start.elapsed(), "batch complete");
    }

    Ok(BatchOutcome {
        table: LongTable::concat(tables),
        failures,
    })
}
