//! HTTP backend for an Elasticsearch-compatible search engine.
//!
//! Synchronous (`ureq`) like the rest of the remote plumbing; callers on the
//! async side go through `tokio::task::spawn_blocking`.

use super::backend::{IndexBackend, SearchHit, SearchOutcome};
use super::query::SearchQuery;
use crate::error::{DatastoreError, DatastoreResult};
use serde_json::Value;
use std::time::Duration;

/// Bulk request chunk size, in documents.
const BULK_CHUNK: usize = 500;

/// Client for the search engine's document and search APIs.
pub struct ElasticBackend {
    base_url: String,
    agent: ureq::Agent,
}

impl ElasticBackend {
    /// Create a backend talking to the given engine URL.
    pub fn new(base_url: String, request_timeout: u64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(request_timeout))
            .build();

        Self { base_url, agent }
    }

    fn build_url(&self, resource: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let resource = resource.trim_start_matches('/');
        format!("{}/{}", base, resource)
    }

    /// Flush one NDJSON bulk chunk, returning how many documents the engine
    /// accepted.
    fn flush_chunk(&self, body: &str, chunk_len: usize) -> DatastoreResult<usize> {
        let url = self.build_url("_bulk");
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/x-ndjson")
            .send_string(body)
            .map_err(map_error)?;

        let reply: Value = response
            .into_json()
            .map_err(|e| DatastoreError::Backend(e.to_string()))?;

        let items = reply
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut indexed = 0;
        for item in &items {
            let status = item
                .get("index")
                .and_then(|action| action.get("status"))
                .and_then(Value::as_u64)
                .unwrap_or(0);

            if (200..300).contains(&status) {
                indexed += 1;
            } else {
                tracing::warn!(status, "document rejected during bulk insert");
            }
        }

        if items.len() != chunk_len {
            tracing::warn!(
                sent = chunk_len,
                acknowledged = items.len(),
                "bulk reply did not cover every document"
            );
        }

        Ok(indexed)
    }
}

impl IndexBackend for ElasticBackend {
    fn ping(&self) -> bool {
        self.agent.get(&self.base_url).call().is_ok()
    }

    fn get(&self, index: &str, id: &str) -> DatastoreResult<Value> {
        let url = self.build_url(&format!("{}/_doc/{}", index, id));
        let response = self.agent.get(&url).call().map_err(|error| {
            if let ureq::Error::Status(404, _) = error {
                DatastoreError::NotFound(id.to_string())
            } else {
                map_error(error)
            }
        })?;

        let reply: Value = response
            .into_json()
            .map_err(|e| DatastoreError::Backend(e.to_string()))?;

        reply
            .get("_source")
            .cloned()
            .ok_or_else(|| DatastoreError::Backend("reply without _source".to_string()))
    }

    fn search(&self, index: &str, query: &SearchQuery) -> DatastoreResult<SearchOutcome> {
        let url = self.build_url(&format!("{}/_search", index));
        let body = serde_json::to_value(query)?;

        let response = self
            .agent
            .post(&url)
            .send_json(body)
            .map_err(map_error)?;

        let reply: Value = response
            .into_json()
            .map_err(|e| DatastoreError::Backend(e.to_string()))?;

        let total = reply["hits"]["total"]["value"].as_u64().unwrap_or(0) as usize;

        let hits = reply["hits"]["hits"]
            .as_array()
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .map(|hit| SearchHit {
                id: hit["_id"].as_str().unwrap_or_default().to_string(),
                source: hit["_source"].clone(),
                inner_hits: extract_inner_hits(&hit),
            })
            .collect();

        Ok(SearchOutcome { total, hits })
    }

    fn delete_index(&self, index: &str) -> DatastoreResult<()> {
        let url = self.build_url(index);
        match self.agent.delete(&url).call() {
            Ok(_) => Ok(()),
            // A missing index is already in the desired state
            Err(ureq::Error::Status(404, _)) => Ok(()),
            Err(error) => Err(map_error(error)),
        }
    }

    fn bulk_insert(
        &self,
        index: &str,
        documents: &mut dyn Iterator<Item = (String, Value)>,
    ) -> DatastoreResult<(usize, usize)> {
        let mut indexed = 0;
        let mut total = 0;

        let mut body = String::new();
        let mut chunk_len = 0;

        for (id, document) in documents {
            let action = serde_json::json!({"index": {"_index": index, "_id": id}});
            body.push_str(&serde_json::to_string(&action)?);
            body.push('\n');
            body.push_str(&serde_json::to_string(&document)?);
            body.push('\n');
            chunk_len += 1;
            total += 1;

            if chunk_len == BULK_CHUNK {
                indexed += self.flush_chunk(&body, chunk_len)?;
                body.clear();
                chunk_len = 0;
            }
        }

        if chunk_len > 0 {
            indexed += self.flush_chunk(&body, chunk_len)?;
        }

        Ok((indexed, total))
    }
}

/// Flatten the per-path inner hit groups of a raw hit into one list of
/// subdocument sources.
fn extract_inner_hits(hit: &Value) -> Vec<Value> {
    let Some(groups) = hit.get("inner_hits").and_then(Value::as_object) else {
        return Vec::new();
    };

    groups
        .values()
        .flat_map(|group| {
            group["hits"]["hits"]
                .as_array()
                .cloned()
                .unwrap_or_default()
        })
        .map(|inner| inner["_source"].clone())
        .collect()
}

fn map_error(error: ureq::Error) -> DatastoreError {
    match error {
        ureq::Error::Status(code, response) => {
            let message = response
                .into_string()
                .unwrap_or_else(|_| "Unknown error".to_string());
            DatastoreError::Backend(format!("status {}: {}", code, message))
        }
        ureq::Error::Transport(transport) => DatastoreError::Backend(transport.to_string()),
    }
}
