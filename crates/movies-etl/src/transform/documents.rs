//! Search-ready document shapes
//!
//! Flat, denormalized forms of the three entity kinds, with the derived
//! name-only arrays the search index queries against. Documents are built by
//! the transformers and immutable from the loader's point of view.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A document the loader can bulk-index by id
pub trait SearchDocument: Serialize {
    fn id(&self) -> Uuid;
}

/// Genre reference embedded in a movie document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreRef {
    pub id: Uuid,
    pub name: String,
}

/// Person reference embedded in a movie document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: Uuid,
    pub full_name: String,
}

/// Film membership embedded in a person document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilmRoleRef {
    pub id: Uuid,
    pub roles: Vec<String>,
}

/// Movie document for the `movies` index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovieDocument {
    pub id: Uuid,
    pub imdb_rating: Option<f64>,
    pub title: String,
    pub description: Option<String>,
    pub genres_names: Vec<String>,
    pub directors_names: Vec<String>,
    pub actors_names: Vec<String>,
    pub writers_names: Vec<String>,
    pub genres: Vec<GenreRef>,
    pub directors: Vec<PersonRef>,
    pub actors: Vec<PersonRef>,
    pub writers: Vec<PersonRef>,
}

/// Genre document for the `genres` index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenreDocument {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// Person document for the `persons` index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDocument {
    pub id: Uuid,
    pub full_name: String,
    pub films: Vec<FilmRoleRef>,
}

impl SearchDocument for MovieDocument {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl SearchDocument for GenreDocument {
    fn id(&self) -> Uuid {
        self.id
    }
}

impl SearchDocument for PersonDocument {
    fn id(&self) -> Uuid {
        self.id
    }
}
