//! Movies Search ETL
//!
//! Incremental extract-transform-load pipeline feeding a movie search index
//! from a relational source.
//!
//! # Overview
//!
//! - **Extract**: paginated SQL pulls of rows changed after a resumable
//!   `(modified, id)` cursor, with related rows nested per aggregate root
//! - **Parse/Transform**: a visitor-driven walk over each aggregate
//!   accumulates flat, search-ready documents
//! - **Load**: idempotent bulk upserts into an Elasticsearch-compatible
//!   index, with lazy index creation
//! - **State**: one JSON file of per-stream cursors, persisted only after a
//!   successful load
//!
//! The pipeline is single threaded and polling based: each pass fully drains
//! every stream, then the driver sleeps a fixed interval. Transient
//! infrastructure failures are retried with backoff indefinitely; data errors
//! abort the run without advancing any cursor.
//!
//! # Example
//!
//! ```no_run
//! use movies_etl::{config::Config, pipeline::EtlPipeline};
//! use sqlx::postgres::PgPoolOptions;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let pool = PgPoolOptions::new().connect_lazy(&config.database.url)?;
//!     let mut pipeline = EtlPipeline::new(pool, &config)?;
//!     pipeline.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod load;
pub mod parse;
pub mod pipeline;
pub mod retry;
pub mod state;
pub mod transform;

// Re-export commonly used types
pub use error::{EtlError, Result};
