//! The index backend seam: the dispatcher talks to whatever store executes
//! the typed query model.

use super::query::SearchQuery;
use crate::error::DatastoreResult;
use serde_json::Value;

/// A single search hit: document id, projected source and any inner hits
/// produced by a nested query.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub source: Value,
    pub inner_hits: Vec<Value>,
}

/// Outcome of a search: total match count before any size cutoff, plus the
/// returned page of hits.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub total: usize,
    pub hits: Vec<SearchHit>,
}

/// A document store that can execute the typed query model.
pub trait IndexBackend: Send + Sync {
    /// Whether the store is up and answering.
    fn ping(&self) -> bool;

    /// Fetch a single document by id.
    fn get(&self, index: &str, id: &str) -> DatastoreResult<Value>;

    /// Execute a search request against one index.
    fn search(&self, index: &str, query: &SearchQuery) -> DatastoreResult<SearchOutcome>;

    /// Drop an index. Deleting an index that does not exist is not an error.
    fn delete_index(&self, index: &str) -> DatastoreResult<()>;

    /// Insert `(id, document)` pairs into an index.
    ///
    /// Returns `(indexed, total)`: per-document rejections are counted, not
    /// fatal.
    fn bulk_insert(
        &self,
        index: &str,
        documents: &mut dyn Iterator<Item = (String, Value)>,
    ) -> DatastoreResult<(usize, usize)>;
}
