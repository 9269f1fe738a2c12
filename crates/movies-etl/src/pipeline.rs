//! Pipeline orchestration
//!
//! Wires extractor, transformer, and loader per stream. A stream is drained
//! batch by batch: extract at the cursor, transform, load, and only after a
//! successful load overwrite the in-memory cursor and persist the whole
//! state file. One full pass drains every stream in order; the driver then
//! sleeps the poll interval and goes again. Change detection is polling
//! based, so latency is bounded by poll interval plus batch time.

use serde_json::Value;
use sqlx::PgPool;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::extract::{PgExtractor, StreamKind, StreamSource};
use crate::load::{schema::IndexSchemas, SearchClient};
use crate::retry::RetryPolicy;
use crate::state::{PipelineState, StateFile};
use crate::transform::{GenreTransformer, MovieTransformer, PersonTransformer, Transform};

/// Drain one stream until it reports caught-up
///
/// Returns the number of documents loaded. The cursor is persisted after
/// each successfully loaded batch and never before; a crash between load and
/// persist re-delivers at most that one batch on restart, which the
/// idempotent loader absorbs.
pub async fn drain_stream<S, T>(
    stream: StreamKind,
    source: &S,
    transformer: &T,
    client: &SearchClient,
    mapping: &Value,
    state: &mut PipelineState,
    state_file: &StateFile,
) -> Result<u64>
where
    S: StreamSource,
    T: Transform,
{
    let mut loaded: u64 = 0;
    let mut index_ready = false;

    loop {
        let cursor = state.cursor(stream.name());
        let aggregates = source.fetch_batch(&cursor).await?;
        if aggregates.is_empty() {
            debug!("Stream {} is caught up", stream);
            break;
        }

        let result = transformer.transform_batch(&aggregates)?;
        if result.documents.is_empty() {
            break;
        }

        if !index_ready {
            client.ensure_index(stream.index(), mapping).await?;
            index_ready = true;
        }

        client.bulk_upsert(stream.index(), &result.documents).await?;

        // Load succeeded; only now may the cursor move.
        state.set_cursor(stream.name(), result.last_modified);
        state_file.save(state)?;

        loaded += result.documents.len() as u64;
        info!(
            "Loaded batch of {} {} documents, cursor at ({:?}, {:?})",
            result.documents.len(),
            stream,
            result.last_modified.modified,
            result.last_modified.id
        );
    }

    Ok(loaded)
}

/// The full three-stream pipeline over Postgres and the search index
pub struct EtlPipeline {
    movies: PgExtractor,
    genres: PgExtractor,
    persons: PgExtractor,
    client: SearchClient,
    schemas: IndexSchemas,
    state_file: StateFile,
    state: PipelineState,
    poll_interval: Duration,
}

impl EtlPipeline {
    /// Build the pipeline: load index schemas and the persisted state
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        let retry = RetryPolicy::new(
            Duration::from_millis(config.pipeline.retry_initial_delay_ms),
            Duration::from_millis(config.pipeline.retry_max_delay_ms),
        );
        let batch_size = config.pipeline.batch_size;

        let schemas = IndexSchemas::load(&config.search.schema_dir)?;
        let state_file = StateFile::new(&config.pipeline.state_file);
        let state = state_file.load();

        Ok(Self {
            movies: PgExtractor::new(pool.clone(), StreamKind::Movies, batch_size, retry),
            genres: PgExtractor::new(pool.clone(), StreamKind::Genres, batch_size, retry),
            persons: PgExtractor::new(pool, StreamKind::Persons, batch_size, retry),
            client: SearchClient::new(&config.search.url, retry),
            schemas,
            state_file,
            state,
            poll_interval: Duration::from_secs(config.pipeline.poll_interval_secs),
        })
    }

    /// One full pass: drain every stream in order
    ///
    /// Returns the total number of documents loaded across all streams.
    pub async fn run_pass(&mut self) -> Result<u64> {
        let start = Instant::now();
        let mut total: u64 = 0;

        total += drain_stream(
            StreamKind::Movies,
            &self.movies,
            &MovieTransformer,
            &self.client,
            self.schemas.for_stream(StreamKind::Movies),
            &mut self.state,
            &self.state_file,
        )
        .await?;

        total += drain_stream(
            StreamKind::Genres,
            &self.genres,
            &GenreTransformer,
            &self.client,
            self.schemas.for_stream(StreamKind::Genres),
            &mut self.state,
            &self.state_file,
        )
        .await?;

        total += drain_stream(
            StreamKind::Persons,
            &self.persons,
            &PersonTransformer,
            &self.client,
            self.schemas.for_stream(StreamKind::Persons),
            &mut self.state,
            &self.state_file,
        )
        .await?;

        if total > 0 {
            info!(
                "Pass complete: {} documents loaded in {:.2}s",
                total,
                start.elapsed().as_secs_f64()
            );
        } else {
            debug!("Pass complete: all streams caught up");
        }

        Ok(total)
    }

    /// Poll forever: drain all streams, sleep, repeat
    ///
    /// Runs until the process is killed or a non-retryable error propagates.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Starting ETL polling loop (interval: {:?})",
            self.poll_interval
        );
        loop {
            self.run_pass().await?;
            sleep(self.poll_interval).await;
        }
    }
}
