//! Bulk loading into the search index
//!
//! Talks to an Elasticsearch-compatible HTTP API. Index creation is lazy and
//! idempotent ("already exists" is a no-op, concurrent creators race
//! harmlessly); document writes are bulk upserts keyed by id, so re-loading a
//! batch after a mid-batch failure overwrites instead of duplicating.

pub mod schema;

use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::error::{EtlError, Result};
use crate::retry::{retry_transient, RetryPolicy};
use crate::transform::SearchDocument;

/// HTTP client for the search index
#[derive(Debug, Clone)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl SearchClient {
    pub fn new(base_url: impl Into<String>, retry: RetryPolicy) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: reqwest::Client::new(),
            base_url,
            retry,
        }
    }

    /// Create the index with its mapping, tolerating "already exists"
    pub async fn ensure_index(&self, index: &str, mapping: &Value) -> Result<()> {
        let op_name = format!("create index {}", index);
        retry_transient(self.retry, &op_name, || self.create_index(index, mapping)).await
    }

    async fn create_index(&self, index: &str, mapping: &Value) -> Result<()> {
        let response = self
            .http
            .put(format!("{}/{}", self.base_url, index))
            .json(mapping)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!("Created index {}", index);
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        if status.as_u16() == 400 && body.contains("resource_already_exists_exception") {
            debug!("Index {} already exists", index);
            return Ok(());
        }

        Err(EtlError::SearchStatus {
            operation: format!("create index {}", index),
            status: status.as_u16(),
            body,
        })
    }

    /// Bulk-upsert documents by id
    ///
    /// A partial bulk failure aborts the batch: every rejected item is logged
    /// and the error propagates so the caller does not advance its cursor.
    pub async fn bulk_upsert<D: SearchDocument>(&self, index: &str, documents: &[D]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let body = bulk_body(index, documents)?;
        let op_name = format!("bulk load {}", index);
        retry_transient(self.retry, &op_name, || {
            self.send_bulk(index, body.clone(), documents.len())
        })
        .await
    }

    async fn send_bulk(&self, index: &str, body: String, total: usize) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/_bulk", self.base_url))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EtlError::SearchStatus {
                operation: format!("bulk load {}", index),
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        if !payload["errors"].as_bool().unwrap_or(false) {
            debug!("Bulk loaded {} documents into {}", total, index);
            return Ok(());
        }

        let mut failed = 0;
        if let Some(items) = payload["items"].as_array() {
            for item in items {
                let detail = &item["index"];
                if detail["error"].is_null() {
                    continue;
                }
                failed += 1;
                error!(
                    index = index,
                    doc_id = %detail["_id"],
                    status = %detail["status"],
                    reason = %detail["error"]["reason"],
                    "Bulk item rejected"
                );
            }
        }

        Err(EtlError::BulkRejected { failed, total })
    }
}

/// Render the NDJSON body for a bulk request
///
/// One action line (`index` upserts by `_id`) followed by one document line
/// per document, each newline-terminated.
pub fn bulk_body<D: SearchDocument>(index: &str, documents: &[D]) -> Result<String> {
    let mut body = String::new();
    for doc in documents {
        let action = serde_json::json!({"index": {"_index": index, "_id": doc.id()}});
        body.push_str(&serde_json::to_string(&action)?);
        body.push('\n');
        body.push_str(&serde_json::to_string(doc)?);
        body.push('\n');
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::GenreDocument;
    use uuid::Uuid;

    #[test]
    fn test_bulk_body_alternates_action_and_document_lines() {
        let docs = vec![
            GenreDocument {
                id: Uuid::new_v4(),
                name: "Action".to_string(),
                description: None,
            },
            GenreDocument {
                id: Uuid::new_v4(),
                name: "Drama".to_string(),
                description: Some("slow".to_string()),
            },
        ];

        let body = bulk_body("genres", &docs).unwrap();
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(body.ends_with('\n'));

        let action: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(action["index"]["_index"], "genres");
        assert_eq!(action["index"]["_id"], docs[0].id.to_string());

        let doc: Value = serde_json::from_str(lines[3]).unwrap();
        assert_eq!(doc["name"], "Drama");
    }

    #[test]
    fn test_same_id_renders_same_action_target() {
        // Upsert semantics hinge on the _id: two loads of one id address the
        // same document, so the index overwrites rather than duplicates.
        let id = Uuid::new_v4();
        let before = GenreDocument {
            id,
            name: "Old".to_string(),
            description: None,
        };
        let after = GenreDocument {
            id,
            name: "New".to_string(),
            description: None,
        };

        let first = bulk_body("genres", std::slice::from_ref(&before)).unwrap();
        let second = bulk_body("genres", std::slice::from_ref(&after)).unwrap();

        let action = |body: &str| -> Value {
            serde_json::from_str(body.lines().next().unwrap()).unwrap()
        };
        assert_eq!(action(&first)["index"]["_id"], action(&second)["index"]["_id"]);
    }

    #[test]
    fn test_empty_batch_renders_empty_body() {
        let body = bulk_body::<GenreDocument>("genres", &[]).unwrap();
        assert!(body.is_empty());
    }
}
