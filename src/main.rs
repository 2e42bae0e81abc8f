use anyhow::{Context, Result};
use finscraper::{
    fetch::http::HttpSessionFactory, pipeline::RunOutput, write::write_output, Config, Scraper,
};
use std::{env, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,finscraper=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
    info!("startup");

    // ─── 2) load config ──────────────────────────────────────────────
    let config = match env::args().nth(1).or_else(|| env::var("FINSCRAPER_CONFIG").ok()) {
        Some(path) => Config::from_path(&path)?,
        None => {
            info!("no config given, using defaults");
            Config::default()
        }
    };
    info!(
        index = %config.index_url,
        workers = config.worker_count,
        batch_size = config.batch_size,
        policy = ?config.failure_policy,
        "configured"
    );
    let output_dir = config.output_dir.clone();

    // ─── 3) scrape + clean on the blocking pool ──────────────────────
    let start = Instant::now();
    let output: RunOutput = tokio::task::spawn_blocking(move || -> Result<RunOutput> {
        let factory = HttpSessionFactory::new(
            config.user_agent.clone(),
            Duration::from_secs(config.request_timeout_secs),
        );
        let scraper = Scraper::new(config, Arc::new(factory))?;
        Ok(scraper.run()?)
    })
    .await
    .context("scrape task panicked")?
    .map_err(|e| {
        error!("run failed: {:#}", e);
        e
    })?;

    for failure in &output.failures {
        error!(entity = %failure.entity, "{}", failure.error);
    }

    // ─── 4) write outputs ────────────────────────────────────────────
    let paths = write_output(&output, &output_dir)?;
    for p in &paths {
        info!("wrote {}", p.display());
    }

    info!(elapsed = ?start.elapsed(), "all done");
    Ok(())
}
