//! Extraction from the relational source
//!
//! One SQL statement per fetch: rows changed after the cursor, deterministic
//! `(modified, id)` ordering, fixed batch limit. Aggregate-root streams pull
//! their related rows nested as jsonb arrays so a genre or cast change
//! re-surfaces the owning film.

pub mod query;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;
use crate::retry::{retry_transient, RetryPolicy};
use crate::state::LastModified;

/// Kind of nested sub-record inside an aggregate
///
/// Film-root aggregates carry `Genre` and `Person` records; person-root
/// aggregates carry `Film` membership records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelatedKind {
    Genre,
    Person,
    Film,
}

/// One nested sub-record, still in its raw JSON shape
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedRecord {
    pub kind: RelatedKind,
    pub data: Value,
}

/// Denormalized row for one aggregate root
///
/// `modified` is the effective modification time: the greatest of the root's
/// own timestamp and those of its related rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAggregate {
    pub id: Uuid,
    pub modified: DateTime<Utc>,
    pub fields: Map<String, Value>,
    pub related: Vec<RelatedRecord>,
}

/// The three change streams fed into the search index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Movies,
    Genres,
    Persons,
}

impl StreamKind {
    /// All streams, in the order the orchestrator drains them
    pub const ALL: [StreamKind; 3] = [StreamKind::Movies, StreamKind::Genres, StreamKind::Persons];

    /// Stable stream name, used as the state-file key
    pub fn name(&self) -> &'static str {
        match self {
            StreamKind::Movies => "movies",
            StreamKind::Genres => "genres",
            StreamKind::Persons => "persons",
        }
    }

    /// Destination index for this stream's documents
    pub fn index(&self) -> &'static str {
        match self {
            StreamKind::Movies => "movies",
            StreamKind::Genres => "genres",
            StreamKind::Persons => "persons",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Source of raw aggregates for one stream
///
/// The seam between the orchestrator and the relational store; tests swap in
/// an in-memory implementation.
#[async_trait]
pub trait StreamSource: Send + Sync {
    /// Fetch the next batch of aggregates strictly after the cursor
    ///
    /// An empty vec means the stream is caught up. Finite and restartable:
    /// calling again with the same cursor returns the same rows.
    async fn fetch_batch(&self, cursor: &LastModified) -> Result<Vec<RawAggregate>>;
}

/// Postgres-backed extractor for one stream
pub struct PgExtractor {
    pool: PgPool,
    stream: StreamKind,
    batch_size: i64,
    retry: RetryPolicy,
}

impl PgExtractor {
    pub fn new(pool: PgPool, stream: StreamKind, batch_size: i64, retry: RetryPolicy) -> Self {
        Self {
            pool,
            stream,
            batch_size,
            retry,
        }
    }

    async fn run_query(&self, cursor: &LastModified) -> Result<Vec<RawAggregate>> {
        let (modified, id) = cursor.bind_values();

        let rows = sqlx::query(query::sql_for(self.stream))
            .bind(modified)
            .bind(id)
            .bind(self.batch_size)
            .fetch_all(&self.pool)
            .await?;

        debug!(
            "Extracted {} {} aggregates after cursor ({:?}, {:?})",
            rows.len(),
            self.stream,
            cursor.modified,
            cursor.id
        );

        rows.iter()
            .map(|row| query::map_row(self.stream, row))
            .collect()
    }
}

#[async_trait]
impl StreamSource for PgExtractor {
    async fn fetch_batch(&self, cursor: &LastModified) -> Result<Vec<RawAggregate>> {
        let op_name = format!("extract {}", self.stream);
        retry_transient(self.retry, &op_name, || self.run_query(cursor)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_names_are_stable() {
        assert_eq!(StreamKind::Movies.name(), "movies");
        assert_eq!(StreamKind::Genres.name(), "genres");
        assert_eq!(StreamKind::Persons.name(), "persons");
    }

    #[test]
    fn test_drain_order_starts_with_movies() {
        assert_eq!(StreamKind::ALL[0], StreamKind::Movies);
        assert_eq!(StreamKind::ALL.len(), 3);
    }
}
