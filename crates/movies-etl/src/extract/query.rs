//! Per-stream SQL and row mapping
//!
//! Every statement binds the same three parameters: `$1` cursor timestamp,
//! `$2` cursor id, `$3` batch limit. The tie-break predicate
//! `modified > $1 OR (modified = $1 AND id > $2)` together with
//! `ORDER BY modified, id` gives each stream a total delivery order, so
//! consecutive batches never skip or repeat a row even when many rows share
//! one timestamp.

use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::Row;

use super::{RawAggregate, RelatedKind, RelatedRecord, StreamKind};
use crate::error::{EtlError, Result};

/// Film aggregates with nested genres and cast
///
/// The effective modification time is the greatest of the film's own
/// timestamp and those of its genres and persons, so a change to either
/// re-surfaces the film.
const MOVIES_SQL: &str = r#"
SELECT fw.id,
       fw.title,
       fw.description,
       fw.rating,
       GREATEST(fw.modified, MAX(g.modified), MAX(p.modified)) AS modified,
       COALESCE(
           jsonb_agg(DISTINCT jsonb_build_object('id', g.id, 'name', g.name))
               FILTER (WHERE g.id IS NOT NULL),
           '[]'
       ) AS genres,
       COALESCE(
           jsonb_agg(DISTINCT jsonb_build_object(
               'id', p.id, 'full_name', p.full_name, 'role', pfw.role))
               FILTER (WHERE p.id IS NOT NULL),
           '[]'
       ) AS persons
FROM content.film_work fw
LEFT JOIN content.genre_film_work gfw ON gfw.film_work_id = fw.id
LEFT JOIN content.genre g ON g.id = gfw.genre_id
LEFT JOIN content.person_film_work pfw ON pfw.film_work_id = fw.id
LEFT JOIN content.person p ON p.id = pfw.person_id
GROUP BY fw.id
HAVING GREATEST(fw.modified, MAX(g.modified), MAX(p.modified)) > $1
    OR (GREATEST(fw.modified, MAX(g.modified), MAX(p.modified)) = $1 AND fw.id > $2)
ORDER BY modified, id
LIMIT $3
"#;

/// Plain genre rows, no nesting
const GENRES_SQL: &str = r#"
SELECT g.id,
       g.name,
       g.description,
       g.modified
FROM content.genre g
WHERE g.modified > $1
   OR (g.modified = $1 AND g.id > $2)
ORDER BY g.modified, g.id
LIMIT $3
"#;

/// Person aggregates with nested film memberships
const PERSONS_SQL: &str = r#"
SELECT p.id,
       p.full_name,
       GREATEST(p.modified, MAX(fw.modified)) AS modified,
       COALESCE(
           jsonb_agg(DISTINCT jsonb_build_object('id', fw.id, 'role', pfw.role))
               FILTER (WHERE fw.id IS NOT NULL),
           '[]'
       ) AS films
FROM content.person p
LEFT JOIN content.person_film_work pfw ON pfw.person_id = p.id
LEFT JOIN content.film_work fw ON fw.id = pfw.film_work_id
GROUP BY p.id
HAVING GREATEST(p.modified, MAX(fw.modified)) > $1
    OR (GREATEST(p.modified, MAX(fw.modified)) = $1 AND p.id > $2)
ORDER BY modified, id
LIMIT $3
"#;

/// SQL statement for a stream
pub fn sql_for(stream: StreamKind) -> &'static str {
    match stream {
        StreamKind::Movies => MOVIES_SQL,
        StreamKind::Genres => GENRES_SQL,
        StreamKind::Persons => PERSONS_SQL,
    }
}

/// Map one database row into a [`RawAggregate`]
pub fn map_row(stream: StreamKind, row: &PgRow) -> Result<RawAggregate> {
    let id = row.try_get("id")?;
    let modified = row.try_get("modified")?;
    let mut fields = Map::new();
    let mut related = Vec::new();

    match stream {
        StreamKind::Movies => {
            fields.insert("title".into(), Value::from(row.try_get::<String, _>("title")?));
            fields.insert(
                "description".into(),
                option_to_value(row.try_get::<Option<String>, _>("description")?),
            );
            fields.insert(
                "rating".into(),
                option_to_value(row.try_get::<Option<f64>, _>("rating")?),
            );
            related.extend(related_from_json(
                RelatedKind::Genre,
                row.try_get::<Value, _>("genres")?,
            )?);
            related.extend(related_from_json(
                RelatedKind::Person,
                row.try_get::<Value, _>("persons")?,
            )?);
        },
        StreamKind::Genres => {
            fields.insert("name".into(), Value::from(row.try_get::<String, _>("name")?));
            fields.insert(
                "description".into(),
                option_to_value(row.try_get::<Option<String>, _>("description")?),
            );
        },
        StreamKind::Persons => {
            fields.insert(
                "full_name".into(),
                Value::from(row.try_get::<String, _>("full_name")?),
            );
            related.extend(related_from_json(
                RelatedKind::Film,
                row.try_get::<Value, _>("films")?,
            )?);
        },
    }

    Ok(RawAggregate {
        id,
        modified,
        fields,
        related,
    })
}

/// Split a jsonb-aggregated array into tagged related records
pub fn related_from_json(kind: RelatedKind, value: Value) -> Result<Vec<RelatedRecord>> {
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .map(|data| RelatedRecord { kind, data })
            .collect()),
        other => Err(EtlError::MalformedRow(format!(
            "expected jsonb array of {:?} records, got {}",
            kind, other
        ))),
    }
}

fn option_to_value<T: Into<Value>>(opt: Option<T>) -> Value {
    opt.map(Into::into).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_stream_orders_and_limits_deterministically() {
        for stream in StreamKind::ALL {
            let sql = sql_for(stream);
            assert!(sql.contains("ORDER BY"), "{stream}: missing ORDER BY");
            assert!(sql.contains("modified,"), "{stream}: order must lead with modified");
            assert!(sql.contains("LIMIT $3"), "{stream}: missing batch limit");
        }
    }

    #[test]
    fn test_every_stream_applies_the_tie_break_filter() {
        for stream in StreamKind::ALL {
            let sql = sql_for(stream);
            assert!(sql.contains("> $1"), "{stream}: missing timestamp filter");
            assert!(
                sql.contains("= $1") && sql.contains("> $2"),
                "{stream}: missing id tie-break"
            );
        }
    }

    #[test]
    fn test_aggregate_roots_use_effective_modified() {
        assert!(sql_for(StreamKind::Movies).contains("GREATEST(fw.modified"));
        assert!(sql_for(StreamKind::Persons).contains("GREATEST(p.modified"));
        assert!(!sql_for(StreamKind::Genres).contains("GREATEST"));
    }

    #[test]
    fn test_related_from_json_tags_each_element() {
        let value = json!([{"id": "a", "name": "Action"}, {"id": "b", "name": "Drama"}]);
        let records = related_from_json(RelatedKind::Genre, value).unwrap();

        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.kind == RelatedKind::Genre));
        assert_eq!(records[0].data["name"], "Action");
    }

    #[test]
    fn test_related_from_json_rejects_non_arrays() {
        let err = related_from_json(RelatedKind::Person, json!({"id": "a"}));
        assert!(matches!(err, Err(EtlError::MalformedRow(_))));
    }

    #[test]
    fn test_empty_jsonb_array_yields_no_records() {
        let records = related_from_json(RelatedKind::Film, json!([])).unwrap();
        assert!(records.is_empty());
    }
}
