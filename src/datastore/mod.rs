//! The search datastore: intent dispatch, document lookups and bulk loading
//! on top of a pluggable index backend.

mod backend;
mod elastic;
mod memory;
pub mod query;

pub use backend::{IndexBackend, SearchHit, SearchOutcome};
pub use elastic::ElasticBackend;
pub use memory::MemoryIndex;
pub use query::{search_intents, EMPLOYEES_INDEX, ORG_UNITS_INDEX};

use crate::error::{DatastoreError, DatastoreResult};
use query::query_match_all;
use serde_json::Value;
use std::sync::Arc;

/// Facade over the index backend.
///
/// All searching goes through the closed intent table; the caller never
/// supplies query shapes, only an intent key and a value.
pub struct DataStore {
    backend: Arc<dyn IndexBackend>,
}

impl DataStore {
    pub fn new(backend: Arc<dyn IndexBackend>) -> Self {
        Self { backend }
    }

    /// Whether the backing store is up.
    pub fn ping(&self) -> bool {
        self.backend.ping()
    }

    /// Fetch one employee document by uuid.
    pub fn get_employee(&self, uuid: &str) -> DatastoreResult<Value> {
        self.backend.get(EMPLOYEES_INDEX, uuid)
    }

    /// Fetch one org unit document by uuid.
    pub fn get_org_unit(&self, uuid: &str) -> DatastoreResult<Value> {
        self.backend.get(ORG_UNITS_INDEX, uuid)
    }

    /// Number of documents in an index.
    pub fn get_size(&self, index: &str) -> DatastoreResult<usize> {
        let query = query_match_all(0, &[]);
        Ok(self.backend.search(index, &query)?.total)
    }

    /// Every org unit, projected down to `{uuid, name, parent}`.
    ///
    /// Two round trips: a count probe, then a `match_all` sized to fetch the
    /// full set in one page.
    pub fn get_all_org_units(&self) -> DatastoreResult<Vec<Value>> {
        let total = self.get_size(ORG_UNITS_INDEX)?;
        let query = query_match_all(total, &["uuid", "name", "parent"]);
        let outcome = self.backend.search(ORG_UNITS_INDEX, &query)?;
        Ok(outcome.hits.into_iter().map(|hit| hit.source).collect())
    }

    /// Dispatch one search by intent key.
    ///
    /// `fuzzy` selects the broad variant of the intent's query. An unknown
    /// intent key is a dispatch error, never an empty result.
    pub fn search(
        &self,
        search_type: &str,
        search_value: &str,
        fuzzy: bool,
    ) -> DatastoreResult<Vec<Value>> {
        let intent = search_intents()
            .get(search_type)
            .ok_or_else(|| DatastoreError::InvalidSearchType(search_type.to_string()))?;

        let plan = (intent.builder)(search_value, fuzzy);

        tracing::debug!(
            search_type,
            search_value,
            fuzzy,
            index = plan.index,
            "dispatching search"
        );

        let outcome = self.backend.search(plan.index, &plan.query)?;

        let results = match plan.processor {
            Some(processor) => outcome.hits.iter().map(processor).collect(),
            None => outcome.hits.into_iter().map(|hit| hit.source).collect(),
        };

        Ok(results)
    }

    /// Replace the contents of an index with the given documents.
    ///
    /// The index is dropped first; returns `(indexed, total)` so callers can
    /// report partial acceptance.
    pub fn load_index(
        &self,
        index: &str,
        documents: impl IntoIterator<Item = (String, Value)>,
    ) -> DatastoreResult<(usize, usize)> {
        self.backend.delete_index(index)?;

        let mut stream = documents.into_iter();
        let (indexed, total) = self.backend.bulk_insert(index, &mut stream)?;

        tracing::info!(index, indexed, total, "index loaded");
        Ok((indexed, total))
    }
}
