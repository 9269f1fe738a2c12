//! Movies Search ETL - main entry point

use anyhow::{Context, Result};
use clap::Parser;
use movies_common::logging::{init_logging, LogConfig};
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

use movies_etl::{config::Config, pipeline::EtlPipeline};

/// Incremental ETL from the movies database into the search index
#[derive(Parser, Debug)]
#[command(name = "movies-etl", version, about)]
struct Cli {
    /// Run a single pass over all streams and exit
    #[arg(long)]
    once: bool,

    /// Override the cursor state file path
    #[arg(long, env = "ETL_STATE_FILE")]
    state_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Environment overrides the built-in defaults
    let log_config = LogConfig::from_env()
        .unwrap_or_default()
        .with_file_prefix("movies-etl");
    init_logging(&log_config)?;

    info!("Starting movies-etl");

    let mut config = Config::load()?;
    if let Some(path) = cli.state_file {
        config.pipeline.state_file = path;
    }
    info!(
        "Configuration loaded - source: {}, index: {}, state file: {}",
        config.database.url, config.search.url, config.pipeline.state_file
    );

    // Lazy connect: the source being down at startup is a transient
    // condition, handled by the extractor's retry loop per query.
    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .connect_lazy(&config.database.url)
        .context("Invalid database URL")?;

    let mut pipeline = EtlPipeline::new(pool, &config)?;

    if cli.once {
        let loaded = pipeline.run_pass().await?;
        info!("Single pass finished: {} documents loaded", loaded);
        return Ok(());
    }

    tokio::select! {
        result = pipeline.run() => {
            if let Err(e) = &result {
                error!("Pipeline aborted: {}", e);
            }
            result?;
        },
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received, stopping");
        },
    }

    Ok(())
}
