//! In-process index backend.
//!
//! Executes the typed query model against documents held in memory. Used by
//! tests and as a datastore stand-in when no external search engine is
//! reachable; the matching semantics mirror the remote engine closely enough
//! to exercise the dispatcher end to end.

use super::backend::{IndexBackend, SearchHit, SearchOutcome};
use super::query::{QueryKind, SearchQuery};
use crate::error::{DatastoreError, DatastoreResult};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

/// An in-memory document store keyed by index name and document id.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    indices: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> DatastoreResult<std::sync::MutexGuard<'_, HashMap<String, BTreeMap<String, Value>>>> {
        self.indices
            .lock()
            .map_err(|_| DatastoreError::Backend("index lock poisoned".to_string()))
    }
}

impl IndexBackend for MemoryIndex {
    fn ping(&self) -> bool {
        true
    }

    fn get(&self, index: &str, id: &str) -> DatastoreResult<Value> {
        let indices = self.lock()?;
        indices
            .get(index)
            .and_then(|documents| documents.get(id))
            .cloned()
            .ok_or_else(|| DatastoreError::NotFound(id.to_string()))
    }

    fn search(&self, index: &str, query: &SearchQuery) -> DatastoreResult<SearchOutcome> {
        let documents = {
            let indices = self.lock()?;
            indices.get(index).cloned().unwrap_or_default()
        };

        let mut hits = Vec::new();
        for (id, document) in documents {
            let mut inner_hits = Vec::new();
            if eval(&document, &query.query, &mut inner_hits) {
                hits.push(SearchHit {
                    id,
                    source: project_source(&document, &query.source.includes),
                    inner_hits,
                });
            }
        }

        let total = hits.len();
        if let Some(size) = query.size {
            hits.truncate(size);
        }

        Ok(SearchOutcome { total, hits })
    }

    fn delete_index(&self, index: &str) -> DatastoreResult<()> {
        let mut indices = self.lock()?;
        indices.remove(index);
        Ok(())
    }

    fn bulk_insert(
        &self,
        index: &str,
        documents: &mut dyn Iterator<Item = (String, Value)>,
    ) -> DatastoreResult<(usize, usize)> {
        let mut indices = self.lock()?;
        let target = indices.entry(index.to_string()).or_default();

        let mut total = 0;
        for (id, document) in documents {
            target.insert(id, document);
            total += 1;
        }

        Ok((total, total))
    }
}

/// Evaluate a query against one document, collecting nested inner hits.
fn eval(document: &Value, query: &QueryKind, inner_hits: &mut Vec<Value>) -> bool {
    match query {
        QueryKind::Match(fields) => fields
            .iter()
            .all(|(field, value)| matches_tokens(&field_values(document, field), value)),

        QueryKind::MatchPhrasePrefix(fields) => fields
            .iter()
            .all(|(field, value)| matches_prefix(&field_values(document, field), value)),

        QueryKind::MultiMatch { query, fields, .. } => fields
            .iter()
            .any(|field| matches_prefix(&field_values(document, field), query)),

        QueryKind::Bool { must, should } => {
            if must.is_empty() {
                should.iter().any(|clause| eval(document, clause, inner_hits))
            } else {
                must.iter().all(|clause| eval(document, clause, inner_hits))
            }
        }

        QueryKind::Nested {
            path,
            inner_hits: projection,
            query,
        } => {
            let elements = document
                .get(path.as_str())
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            let mut matched = false;
            for element in elements {
                // Wrap the element so field paths like "kles.title" resolve
                let scoped = Value::Object(Map::from_iter([(path.clone(), element)]));
                let mut scratch = Vec::new();
                if eval(&scoped, query, &mut scratch) {
                    matched = true;
                    let element = &scoped[path.as_str()];
                    inner_hits.push(project_inner(element, path, &projection.source));
                }
            }
            matched
        }

        QueryKind::MatchAll {} => true,
    }
}

/// Full-token matching: every whitespace token of the query must occur as a
/// complete token of some field value. "2233" matches "2233" but never
/// "22337744".
fn matches_tokens(values: &[String], query: &str) -> bool {
    let document_tokens: HashSet<String> = values
        .iter()
        .flat_map(|value| value.split_whitespace())
        .map(str::to_lowercase)
        .collect();

    let mut query_tokens = query.split_whitespace().peekable();
    query_tokens.peek().is_some()
        && query
            .split_whitespace()
            .all(|token| document_tokens.contains(&token.to_lowercase()))
}

/// Prefix matching: some field value starts with the query.
fn matches_prefix(values: &[String], query: &str) -> bool {
    let query = query.to_lowercase();
    values
        .iter()
        .any(|value| value.to_lowercase().starts_with(&query))
}

/// All scalar values reachable at a dotted field path, flattening arrays.
fn field_values(document: &Value, path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('.').collect();
    collect_nodes(document, &segments)
        .into_iter()
        .flat_map(|node| match node {
            Value::String(value) => vec![value.clone()],
            Value::Number(value) => vec![value.to_string()],
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        })
        .collect()
}

fn collect_nodes<'a>(value: &'a Value, segments: &[&str]) -> Vec<&'a Value> {
    if segments.is_empty() {
        return vec![value];
    }
    match value {
        Value::Array(items) => items
            .iter()
            .flat_map(|item| collect_nodes(item, segments))
            .collect(),
        Value::Object(map) => map
            .get(segments[0])
            .map(|child| collect_nodes(child, &segments[1..]))
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Project an inner-hit element down to the requested fields, with field
/// paths given relative to the nested root.
fn project_inner(element: &Value, path: &str, fields: &[String]) -> Value {
    let prefix = format!("{}.", path);
    let mut projected = Map::new();

    for field in fields {
        let relative = field.strip_prefix(&prefix).unwrap_or(field);
        if let Some(value) = element.get(relative) {
            projected.insert(relative.to_string(), value.clone());
        }
    }

    Value::Object(projected)
}

/// Apply a `_source.includes` projection to a document. An empty include
/// list returns the document as stored.
fn project_source(document: &Value, includes: &[String]) -> Value {
    if includes.is_empty() {
        return document.clone();
    }

    let mut projected = Map::new();
    for path in includes {
        let segments: Vec<&str> = path.split('.').collect();
        if let Some(value) = pluck(document, &segments) {
            graft(&mut projected, &segments, value);
        }
    }
    Value::Object(projected)
}

fn pluck(value: &Value, segments: &[&str]) -> Option<Value> {
    if segments.is_empty() {
        return Some(value.clone());
    }
    match value {
        Value::Object(map) => map
            .get(segments[0])
            .and_then(|child| pluck(child, &segments[1..])),
        Value::Array(items) => {
            let picked: Vec<Value> = items
                .iter()
                .filter_map(|item| pluck(item, segments))
                .collect();
            if picked.is_empty() {
                None
            } else {
                Some(Value::Array(picked))
            }
        }
        _ => None,
    }
}

fn graft(target: &mut Map<String, Value>, segments: &[&str], value: Value) {
    if segments.len() == 1 {
        target.insert(segments[0].to_string(), value);
        return;
    }
    let child = target
        .entry(segments[0].to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(map) = child {
        graft(map, &segments[1..], value);
    }
}
