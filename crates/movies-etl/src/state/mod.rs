//! Resumable cursor state for the change streams
//!
//! Each stream tracks how far it has consumed the source change log as a
//! `(modified, id)` pair. The id tie-break matters: several rows can share a
//! modification timestamp, and a plain `modified > cursor` filter would skip
//! or re-deliver rows at page boundaries.

pub mod storage;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

pub use storage::StateFile;

/// Resumable position in a change stream
///
/// Immutable value type: advancing a stream produces a new cursor, the old
/// one is never mutated. An empty cursor orders before every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LastModified {
    pub modified: Option<DateTime<Utc>>,
    pub id: Option<Uuid>,
}

impl LastModified {
    /// Cursor positioned before the start of the stream
    pub fn empty() -> Self {
        Self::default()
    }

    /// Cursor positioned exactly at a row
    pub fn at(modified: DateTime<Utc>, id: Uuid) -> Self {
        Self {
            modified: Some(modified),
            id: Some(id),
        }
    }

    /// Invariant check: an id without a timestamp is meaningless
    pub fn is_consistent(&self) -> bool {
        self.id.is_none() || self.modified.is_some()
    }

    /// Whether a row at `(modified, id)` comes after this cursor
    ///
    /// Ordering: strictly later timestamp, or equal timestamp and larger id.
    pub fn is_newer(&self, modified: DateTime<Utc>, id: Uuid) -> bool {
        match self.modified {
            None => true,
            Some(cursor_modified) => {
                modified > cursor_modified
                    || (modified == cursor_modified
                        && self.id.map_or(true, |cursor_id| id > cursor_id))
            },
        }
    }

    /// Values to bind into the tie-break SQL filter
    ///
    /// An empty cursor binds the epoch and the nil UUID, which order before
    /// every real row under the same predicate.
    pub fn bind_values(&self) -> (DateTime<Utc>, Uuid) {
        (
            self.modified.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            self.id.unwrap_or_else(Uuid::nil),
        )
    }
}

/// Per-stream extractor state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ExtractorState {
    pub last_modified: LastModified,
}

/// Cursor state for every stream, persisted as one JSON document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PipelineState {
    pub extractors: BTreeMap<String, ExtractorState>,
}

impl PipelineState {
    /// Cursor for a stream, empty if the stream has never run
    pub fn cursor(&self, stream: &str) -> LastModified {
        self.extractors
            .get(stream)
            .map(|s| s.last_modified)
            .unwrap_or_default()
    }

    /// Overwrite the cursor for a stream
    pub fn set_cursor(&mut self, stream: &str, cursor: LastModified) {
        self.extractors
            .insert(stream.to_string(), ExtractorState { last_modified: cursor });
    }

    /// Whether every stored cursor satisfies the id-implies-timestamp invariant
    pub fn is_consistent(&self) -> bool {
        self.extractors
            .values()
            .all(|s| s.last_modified.is_consistent())
    }
}
