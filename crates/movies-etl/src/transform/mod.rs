//! Transformation of raw aggregates into search documents
//!
//! One transformer per stream, each implementing [`AggregateVisitor`] over a
//! per-aggregate scratch struct: reset at `start_entity`, flushed into a
//! finished document at `end_entity`. The transformer also tracks the running
//! `(modified, id)` cursor; after a batch the final value is exactly what
//! should be persisted once the load succeeds.

pub mod documents;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::error::{EtlError, Result};
use crate::extract::{RawAggregate, RelatedKind};
use crate::parse::{walk_aggregates, AggregateVisitor};
use crate::state::LastModified;

pub use documents::{
    FilmRoleRef, GenreDocument, GenreRef, MovieDocument, PersonDocument, PersonRef, SearchDocument,
};

/// A batch of documents paired with the cursor to persist after loading them
///
/// The pairing carries the core correctness rule: the cursor must never be
/// persisted unless these documents made it into the index.
#[derive(Debug, Clone)]
pub struct TransformResult<D> {
    pub documents: Vec<D>,
    pub last_modified: LastModified,
}

/// Batch transformation for one stream
pub trait Transform {
    type Doc: SearchDocument;

    fn transform_batch(&self, aggregates: &[RawAggregate]) -> Result<TransformResult<Self::Doc>>;
}

/// Person role on a film
///
/// The source column is a loose string; values outside this set are logged
/// and skipped rather than erroring the batch or polluting a catch-all
/// bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Director,
    Actor,
    Writer,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "director" => Some(Role::Director),
            "actor" => Some(Role::Actor),
            "writer" => Some(Role::Writer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Director => "director",
            Role::Actor => "actor",
            Role::Writer => "writer",
        }
    }
}

// ============================================================================
// Field extraction helpers
// ============================================================================

fn field_str(fields: &Map<String, Value>, key: &str) -> Result<String> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| EtlError::MalformedRow(format!("missing or non-string field '{}'", key)))
}

fn field_opt_str(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields.get(key).and_then(Value::as_str).map(str::to_string)
}

fn field_opt_f64(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    fields.get(key).and_then(Value::as_f64)
}

fn related_uuid(data: &Value, key: &str) -> Result<Uuid> {
    data.get(key)
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| {
            EtlError::MalformedRow(format!("missing or invalid '{}' in related record", key))
        })
}

fn related_str(data: &Value, key: &str) -> Result<String> {
    data.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            EtlError::MalformedRow(format!("missing or non-string '{}' in related record", key))
        })
}

// ============================================================================
// Movies
// ============================================================================

struct MovieScratch {
    id: Uuid,
    modified: DateTime<Utc>,
    title: String,
    description: Option<String>,
    rating: Option<f64>,
    genres: Vec<GenreRef>,
    directors: Vec<PersonRef>,
    actors: Vec<PersonRef>,
    writers: Vec<PersonRef>,
}

#[derive(Default)]
struct MovieVisitor {
    current: Option<MovieScratch>,
    documents: Vec<MovieDocument>,
    last_modified: LastModified,
}

impl AggregateVisitor for MovieVisitor {
    fn start_entity(&mut self, aggregate: &RawAggregate) -> Result<()> {
        self.current = Some(MovieScratch {
            id: aggregate.id,
            modified: aggregate.modified,
            title: field_str(&aggregate.fields, "title")?,
            description: field_opt_str(&aggregate.fields, "description"),
            rating: field_opt_f64(&aggregate.fields, "rating"),
            genres: Vec::new(),
            directors: Vec::new(),
            actors: Vec::new(),
            writers: Vec::new(),
        });
        Ok(())
    }

    fn handle_related(&mut self, kind: RelatedKind, data: &Value) -> Result<()> {
        let scratch = self
            .current
            .as_mut()
            .ok_or_else(|| EtlError::MalformedRow("related record outside an entity".into()))?;

        match kind {
            RelatedKind::Genre => {
                let genre = GenreRef {
                    id: related_uuid(data, "id")?,
                    name: related_str(data, "name")?,
                };
                if !scratch.genres.iter().any(|g| g.id == genre.id) {
                    scratch.genres.push(genre);
                }
            },
            RelatedKind::Person => {
                let person = PersonRef {
                    id: related_uuid(data, "id")?,
                    full_name: related_str(data, "full_name")?,
                };
                let raw_role = related_str(data, "role")?;
                let Some(role) = Role::parse(&raw_role) else {
                    warn!(
                        film_id = %scratch.id,
                        person_id = %person.id,
                        role = %raw_role,
                        "Skipping person with unrecognized role"
                    );
                    return Ok(());
                };
                let bucket = match role {
                    Role::Director => &mut scratch.directors,
                    Role::Actor => &mut scratch.actors,
                    Role::Writer => &mut scratch.writers,
                };
                // The same person may repeat within one bucket through join
                // fan-out; across buckets repetition is legitimate.
                if !bucket.iter().any(|p| p.id == person.id) {
                    bucket.push(person);
                }
            },
            RelatedKind::Film => {
                return Err(EtlError::MalformedRow(
                    "film record nested inside a film aggregate".into(),
                ));
            },
        }
        Ok(())
    }

    fn end_entity(&mut self) -> Result<()> {
        let scratch = self
            .current
            .take()
            .ok_or_else(|| EtlError::MalformedRow("end of entity that never started".into()))?;

        let names = |refs: &[PersonRef]| refs.iter().map(|p| p.full_name.clone()).collect();

        self.documents.push(MovieDocument {
            id: scratch.id,
            imdb_rating: scratch.rating,
            title: scratch.title,
            description: scratch.description,
            genres_names: scratch.genres.iter().map(|g| g.name.clone()).collect(),
            directors_names: names(&scratch.directors),
            actors_names: names(&scratch.actors),
            writers_names: names(&scratch.writers),
            genres: scratch.genres,
            directors: scratch.directors,
            actors: scratch.actors,
            writers: scratch.writers,
        });
        self.last_modified = LastModified::at(scratch.modified, scratch.id);
        Ok(())
    }
}

/// Transformer for the movies stream
pub struct MovieTransformer;

impl Transform for MovieTransformer {
    type Doc = MovieDocument;

    fn transform_batch(&self, aggregates: &[RawAggregate]) -> Result<TransformResult<Self::Doc>> {
        let mut visitor = MovieVisitor::default();
        walk_aggregates(aggregates, &mut visitor)?;
        Ok(TransformResult {
            documents: visitor.documents,
            last_modified: visitor.last_modified,
        })
    }
}

// ============================================================================
// Genres
// ============================================================================

struct GenreScratch {
    id: Uuid,
    modified: DateTime<Utc>,
    name: String,
    description: Option<String>,
}

#[derive(Default)]
struct GenreVisitor {
    current: Option<GenreScratch>,
    documents: Vec<GenreDocument>,
    last_modified: LastModified,
}

impl AggregateVisitor for GenreVisitor {
    fn start_entity(&mut self, aggregate: &RawAggregate) -> Result<()> {
        self.current = Some(GenreScratch {
            id: aggregate.id,
            modified: aggregate.modified,
            name: field_str(&aggregate.fields, "name")?,
            description: field_opt_str(&aggregate.fields, "description"),
        });
        Ok(())
    }

    fn handle_related(&mut self, kind: RelatedKind, _data: &Value) -> Result<()> {
        Err(EtlError::MalformedRow(format!(
            "{:?} record nested inside a genre aggregate",
            kind
        )))
    }

    fn end_entity(&mut self) -> Result<()> {
        let scratch = self
            .current
            .take()
            .ok_or_else(|| EtlError::MalformedRow("end of entity that never started".into()))?;

        self.documents.push(GenreDocument {
            id: scratch.id,
            name: scratch.name,
            description: scratch.description,
        });
        self.last_modified = LastModified::at(scratch.modified, scratch.id);
        Ok(())
    }
}

/// Transformer for the genres stream
pub struct GenreTransformer;

impl Transform for GenreTransformer {
    type Doc = GenreDocument;

    fn transform_batch(&self, aggregates: &[RawAggregate]) -> Result<TransformResult<Self::Doc>> {
        let mut visitor = GenreVisitor::default();
        walk_aggregates(aggregates, &mut visitor)?;
        Ok(TransformResult {
            documents: visitor.documents,
            last_modified: visitor.last_modified,
        })
    }
}

// ============================================================================
// Persons
// ============================================================================

struct PersonScratch {
    id: Uuid,
    modified: DateTime<Utc>,
    full_name: String,
    films: Vec<FilmRoleRef>,
}

#[derive(Default)]
struct PersonVisitor {
    current: Option<PersonScratch>,
    documents: Vec<PersonDocument>,
    last_modified: LastModified,
}

impl AggregateVisitor for PersonVisitor {
    fn start_entity(&mut self, aggregate: &RawAggregate) -> Result<()> {
        self.current = Some(PersonScratch {
            id: aggregate.id,
            modified: aggregate.modified,
            full_name: field_str(&aggregate.fields, "full_name")?,
            films: Vec::new(),
        });
        Ok(())
    }

    fn handle_related(&mut self, kind: RelatedKind, data: &Value) -> Result<()> {
        let scratch = self
            .current
            .as_mut()
            .ok_or_else(|| EtlError::MalformedRow("related record outside an entity".into()))?;

        if kind != RelatedKind::Film {
            return Err(EtlError::MalformedRow(format!(
                "{:?} record nested inside a person aggregate",
                kind
            )));
        }

        let film_id = related_uuid(data, "id")?;
        let raw_role = related_str(data, "role")?;
        let Some(role) = Role::parse(&raw_role) else {
            warn!(
                person_id = %scratch.id,
                film_id = %film_id,
                role = %raw_role,
                "Skipping film membership with unrecognized role"
            );
            return Ok(());
        };

        match scratch.films.iter_mut().find(|f| f.id == film_id) {
            Some(film) => {
                if !film.roles.iter().any(|r| r == role.as_str()) {
                    film.roles.push(role.as_str().to_string());
                }
            },
            None => scratch.films.push(FilmRoleRef {
                id: film_id,
                roles: vec![role.as_str().to_string()],
            }),
        }
        Ok(())
    }

    fn end_entity(&mut self) -> Result<()> {
        let scratch = self
            .current
            .take()
            .ok_or_else(|| EtlError::MalformedRow("end of entity that never started".into()))?;

        self.documents.push(PersonDocument {
            id: scratch.id,
            full_name: scratch.full_name,
            films: scratch.films,
        });
        self.last_modified = LastModified::at(scratch.modified, scratch.id);
        Ok(())
    }
}

/// Transformer for the persons stream
pub struct PersonTransformer;

impl Transform for PersonTransformer {
    type Doc = PersonDocument;

    fn transform_batch(&self, aggregates: &[RawAggregate]) -> Result<TransformResult<Self::Doc>> {
        let mut visitor = PersonVisitor::default();
        walk_aggregates(aggregates, &mut visitor)?;
        Ok(TransformResult {
            documents: visitor.documents,
            last_modified: visitor.last_modified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::RelatedRecord;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn movie_aggregate(
        id: Uuid,
        modified: DateTime<Utc>,
        related: Vec<RelatedRecord>,
    ) -> RawAggregate {
        let mut fields = Map::new();
        fields.insert("title".into(), json!("The Test"));
        fields.insert("description".into(), json!("a film"));
        fields.insert("rating".into(), json!(7.5));
        RawAggregate {
            id,
            modified,
            fields,
            related,
        }
    }

    fn person_record(id: Uuid, name: &str, role: &str) -> RelatedRecord {
        RelatedRecord {
            kind: RelatedKind::Person,
            data: json!({"id": id.to_string(), "full_name": name, "role": role}),
        }
    }

    #[test]
    fn test_role_fan_out_keeps_person_in_both_buckets() {
        let person = Uuid::new_v4();
        let aggregate = movie_aggregate(
            Uuid::new_v4(),
            ts(100),
            vec![
                person_record(person, "Jo Coen", "director"),
                person_record(person, "Jo Coen", "writer"),
            ],
        );

        let result = MovieTransformer.transform_batch(&[aggregate]).unwrap();
        let doc = &result.documents[0];

        assert_eq!(doc.directors.len(), 1);
        assert_eq!(doc.writers.len(), 1);
        assert_eq!(doc.directors[0].id, person);
        assert_eq!(doc.writers[0].id, person);
        assert_eq!(doc.directors_names, vec!["Jo Coen"]);
        assert_eq!(doc.writers_names, vec!["Jo Coen"]);
        assert!(doc.actors.is_empty());
    }

    #[test]
    fn test_unrecognized_role_is_skipped_not_fatal() {
        let aggregate = movie_aggregate(
            Uuid::new_v4(),
            ts(100),
            vec![
                person_record(Uuid::new_v4(), "A", "producer"),
                person_record(Uuid::new_v4(), "B", "actor"),
            ],
        );

        let result = MovieTransformer.transform_batch(&[aggregate]).unwrap();
        let doc = &result.documents[0];

        assert_eq!(doc.actors_names, vec!["B"]);
        assert!(doc.directors.is_empty());
        assert!(doc.writers.is_empty());
    }

    #[test]
    fn test_duplicate_related_records_deduplicate_within_bucket() {
        let genre = Uuid::new_v4();
        let actor = Uuid::new_v4();
        let genre_record = RelatedRecord {
            kind: RelatedKind::Genre,
            data: json!({"id": genre.to_string(), "name": "Drama"}),
        };
        let aggregate = movie_aggregate(
            Uuid::new_v4(),
            ts(100),
            vec![
                genre_record.clone(),
                genre_record,
                person_record(actor, "C", "actor"),
                person_record(actor, "C", "actor"),
            ],
        );

        let result = MovieTransformer.transform_batch(&[aggregate]).unwrap();
        let doc = &result.documents[0];
        assert_eq!(doc.genres_names, vec!["Drama"]);
        assert_eq!(doc.actors.len(), 1);
    }

    #[test]
    fn test_cursor_tracks_the_last_aggregate() {
        let first = movie_aggregate(Uuid::new_v4(), ts(100), vec![]);
        let last_id = Uuid::new_v4();
        let last = movie_aggregate(last_id, ts(200), vec![]);

        let result = MovieTransformer.transform_batch(&[first, last]).unwrap();

        assert_eq!(result.documents.len(), 2);
        assert_eq!(result.last_modified, LastModified::at(ts(200), last_id));
    }

    #[test]
    fn test_empty_batch_leaves_cursor_empty() {
        let result = MovieTransformer.transform_batch(&[]).unwrap();
        assert!(result.documents.is_empty());
        assert_eq!(result.last_modified, LastModified::empty());
    }

    #[test]
    fn test_missing_title_is_a_data_error() {
        let aggregate = RawAggregate {
            id: Uuid::new_v4(),
            modified: ts(1),
            fields: Map::new(),
            related: vec![],
        };
        let result = MovieTransformer.transform_batch(&[aggregate]);
        assert!(matches!(result, Err(EtlError::MalformedRow(_))));
    }

    #[test]
    fn test_genre_documents_carry_name_and_description() {
        let id = Uuid::new_v4();
        let mut fields = Map::new();
        fields.insert("name".into(), json!("Horror"));
        fields.insert("description".into(), Value::Null);
        let aggregate = RawAggregate {
            id,
            modified: ts(50),
            fields,
            related: vec![],
        };

        let result = GenreTransformer.transform_batch(&[aggregate]).unwrap();
        let doc = &result.documents[0];

        assert_eq!(doc.id, id);
        assert_eq!(doc.name, "Horror");
        assert_eq!(doc.description, None);
        assert_eq!(result.last_modified, LastModified::at(ts(50), id));
    }

    #[test]
    fn test_person_roles_merge_per_film() {
        let person = Uuid::new_v4();
        let film = Uuid::new_v4();
        let other_film = Uuid::new_v4();
        let mut fields = Map::new();
        fields.insert("full_name".into(), json!("Jo Coen"));

        let film_record = |film_id: Uuid, role: &str| RelatedRecord {
            kind: RelatedKind::Film,
            data: json!({"id": film_id.to_string(), "role": role}),
        };

        let aggregate = RawAggregate {
            id: person,
            modified: ts(10),
            fields,
            related: vec![
                film_record(film, "director"),
                film_record(film, "writer"),
                film_record(other_film, "actor"),
                film_record(other_film, "narrator"),
            ],
        };

        let result = PersonTransformer.transform_batch(&[aggregate]).unwrap();
        let doc = &result.documents[0];

        assert_eq!(doc.full_name, "Jo Coen");
        assert_eq!(doc.films.len(), 2);
        assert_eq!(doc.films[0].id, film);
        assert_eq!(doc.films[0].roles, vec!["director", "writer"]);
        assert_eq!(doc.films[1].roles, vec!["actor"]);
    }
}
