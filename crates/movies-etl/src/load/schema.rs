//! Static index mappings
//!
//! One JSON mapping document per entity kind, read from disk at process start
//! and handed verbatim to index creation.

use serde_json::Value;
use std::path::Path;

use crate::error::{EtlError, Result};
use crate::extract::StreamKind;

/// The three index mappings, loaded once at startup
#[derive(Debug, Clone)]
pub struct IndexSchemas {
    movies: Value,
    genres: Value,
    persons: Value,
}

impl IndexSchemas {
    /// Load `<stream>.json` for every stream from the schema directory
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            movies: load_one(dir, StreamKind::Movies)?,
            genres: load_one(dir, StreamKind::Genres)?,
            persons: load_one(dir, StreamKind::Persons)?,
        })
    }

    /// Mapping for a stream's destination index
    pub fn for_stream(&self, stream: StreamKind) -> &Value {
        match stream {
            StreamKind::Movies => &self.movies,
            StreamKind::Genres => &self.genres,
            StreamKind::Persons => &self.persons,
        }
    }
}

fn load_one(dir: &Path, stream: StreamKind) -> Result<Value> {
    let path = dir.join(format!("{}.json", stream.name()));
    let content = std::fs::read_to_string(&path)
        .map_err(|e| EtlError::Schema(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| EtlError::Schema(format!("{} is not valid JSON: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write_schema(dir: &TempDir, name: &str, value: &Value) {
        std::fs::write(
            dir.path().join(format!("{}.json", name)),
            serde_json::to_string(value).unwrap(),
        )
        .unwrap();
    }

    #[test]
    fn test_load_reads_one_mapping_per_stream() {
        let dir = TempDir::new().unwrap();
        write_schema(&dir, "movies", &json!({"mappings": {"properties": {"title": {}}}}));
        write_schema(&dir, "genres", &json!({"mappings": {"properties": {"name": {}}}}));
        write_schema(&dir, "persons", &json!({"mappings": {"properties": {"full_name": {}}}}));

        let schemas = IndexSchemas::load(dir.path()).unwrap();

        assert!(schemas.for_stream(StreamKind::Movies)["mappings"]["properties"]["title"].is_object());
        assert!(schemas.for_stream(StreamKind::Genres)["mappings"]["properties"]["name"].is_object());
    }

    #[test]
    fn test_missing_mapping_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        write_schema(&dir, "movies", &json!({}));
        // genres.json and persons.json absent

        let result = IndexSchemas::load(dir.path());
        assert!(matches!(result, Err(EtlError::Schema(_))));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        for name in ["movies", "genres", "persons"] {
            std::fs::write(dir.path().join(format!("{}.json", name)), "{broken").unwrap();
        }

        assert!(matches!(IndexSchemas::load(dir.path()), Err(EtlError::Schema(_))));
    }
}
