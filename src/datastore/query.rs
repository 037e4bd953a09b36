//! Typed search query model and the per-intent query builders.
//!
//! Queries serialize to the Elasticsearch request DSL. Each search intent
//! maps to one builder `(value, fuzzy) -> SearchPlan`; the table of intents
//! is closed and every entry carries a live function reference, so an
//! unknown intent is a caller error rather than a dispatch failure.

use super::backend::SearchHit;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::BTreeMap;

/// Index holding employee documents.
pub const EMPLOYEES_INDEX: &str = "employees";

/// Index holding org unit documents.
pub const ORG_UNITS_INDEX: &str = "org_units";

/// Result page size for keyword searches.
const KEYWORD_PAGE_SIZE: usize = 15;

/// Stored-field projection of a query (`_source.includes`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceFilter {
    pub includes: Vec<String>,
}

/// Projection of inner hits returned by a nested query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InnerHits {
    #[serde(rename = "_source")]
    pub source: Vec<String>,
}

/// The supported query shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Exact full-token match on one field
    Match(BTreeMap<String, String>),

    /// Prefix match on one field (broader recall)
    MatchPhrasePrefix(BTreeMap<String, String>),

    /// Disjunctive multi-field match with a tie-break weighting
    MultiMatch {
        query: String,
        #[serde(rename = "type")]
        kind: String,
        fields: Vec<String>,
        tie_breaker: f64,
    },

    /// Compound shape: `must` clauses are required, `should` clauses only
    /// influence preference
    Bool {
        #[serde(skip_serializing_if = "Vec::is_empty")]
        must: Vec<QueryKind>,
        #[serde(skip_serializing_if = "Vec::is_empty")]
        should: Vec<QueryKind>,
    },

    /// Query against a repeated sub-list field, returning the matched
    /// subdocuments as inner hits
    Nested {
        path: String,
        inner_hits: InnerHits,
        query: Box<QueryKind>,
    },

    /// Match every document
    MatchAll {},
}

/// A complete search request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,

    #[serde(rename = "_source")]
    pub source: SourceFilter,

    pub query: QueryKind,
}

/// Post-processor applied to each hit before it is returned to the caller.
pub type HitProcessor = fn(&SearchHit) -> serde_json::Value;

/// A built query: the target index, the request body and an optional result
/// processor. Without a processor the stored source is returned unchanged.
#[derive(Debug, Clone)]
pub struct SearchPlan {
    pub index: &'static str,
    pub query: SearchQuery,
    pub processor: Option<HitProcessor>,
}

/// One entry of the search intent table.
pub struct SearchIntent {
    /// Human readable description, exposed by the schema endpoint
    pub description: &'static str,

    /// Query builder for this intent
    pub builder: fn(&str, bool) -> SearchPlan,
}

/// The closed search intent table.
pub fn search_intents() -> &'static BTreeMap<&'static str, SearchIntent> {
    static INTENTS: Lazy<BTreeMap<&'static str, SearchIntent>> = Lazy::new(|| {
        BTreeMap::from([
            (
                "employee_by_name",
                SearchIntent {
                    description: "Search for an employee by name",
                    builder: employee_by_name,
                },
            ),
            (
                "employee_by_phone",
                SearchIntent {
                    description: "Search for an employee by phone number",
                    builder: employee_by_phone,
                },
            ),
            (
                "employee_by_email",
                SearchIntent {
                    description: "Search for an employee by email address",
                    builder: employee_by_email,
                },
            ),
            (
                "employee_by_engagement",
                SearchIntent {
                    description: "Search for an employee by job title",
                    builder: employee_by_engagement,
                },
            ),
            (
                "org_unit_by_name",
                SearchIntent {
                    description: "Search for an organisation unit by name",
                    builder: org_unit_by_name,
                },
            ),
            (
                "org_unit_by_kle",
                SearchIntent {
                    description: "Search for an organisation unit by KLE classification",
                    builder: org_unit_by_kle,
                },
            ),
        ])
    });

    &INTENTS
}

fn field(name: &str, value: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(name.to_string(), value.to_string())])
}

fn includes(fields: &[&str]) -> SourceFilter {
    SourceFilter {
        includes: fields.iter().map(|f| f.to_string()).collect(),
    }
}

/// A query matching only complete field values.
///
/// `search_value = "cake"` returns "cake" but never "beefcake"; this is the
/// initial narrow search before falling back to broader prefix matching.
fn query_match(search_field: &str, search_value: &str, source: SourceFilter) -> SearchQuery {
    SearchQuery {
        size: Some(KEYWORD_PAGE_SIZE),
        source,
        query: QueryKind::Match(field(search_field, search_value)),
    }
}

/// A query matching everything that starts with the search value.
fn query_match_phrase_prefix(
    search_field: &str,
    search_value: &str,
    source: SourceFilter,
) -> SearchQuery {
    SearchQuery {
        size: Some(KEYWORD_PAGE_SIZE),
        source,
        query: QueryKind::MatchPhrasePrefix(field(search_field, search_value)),
    }
}

/// Employee by name.
///
/// Non-fuzzy: disjunctive phrase-prefix match across surname and full name
/// with a tie-break weighting. Fuzzy: the full value must match the name
/// while a prefix match on the last whitespace token is preferred.
fn employee_by_name(value: &str, fuzzy: bool) -> SearchPlan {
    let source = includes(&["uuid", "name", "addresses.PHONE"]);

    let query = if fuzzy {
        let last_token = value.split_whitespace().last().unwrap_or(value);
        SearchQuery {
            size: None,
            source,
            query: QueryKind::Bool {
                must: vec![QueryKind::Match(field("name", value))],
                should: vec![QueryKind::MatchPhrasePrefix(field("surname", last_token))],
            },
        }
    } else {
        SearchQuery {
            size: None,
            source,
            query: QueryKind::MultiMatch {
                query: value.to_string(),
                kind: "phrase_prefix".to_string(),
                fields: vec!["surname".to_string(), "name".to_string()],
                tie_breaker: 0.3,
            },
        }
    };

    SearchPlan {
        index: EMPLOYEES_INDEX,
        query,
        processor: None,
    }
}

/// Employee by phone number: full-token match first, prefix match when fuzzy.
fn employee_by_phone(value: &str, fuzzy: bool) -> SearchPlan {
    let source = includes(&["uuid", "name", "addresses.PHONE"]);
    let search_field = "addresses.PHONE.value";

    let query = if fuzzy {
        query_match_phrase_prefix(search_field, value, source)
    } else {
        query_match(search_field, value, source)
    };

    SearchPlan {
        index: EMPLOYEES_INDEX,
        query,
        processor: None,
    }
}

/// Employee by email address: prefix match in both modes.
fn employee_by_email(value: &str, _fuzzy: bool) -> SearchPlan {
    SearchPlan {
        index: EMPLOYEES_INDEX,
        query: query_match_phrase_prefix(
            "addresses.EMAIL.value",
            value,
            includes(&["uuid", "name", "addresses.EMAIL"]),
        ),
        processor: None,
    }
}

/// Employee by engagement title: prefix match in both modes.
fn employee_by_engagement(value: &str, _fuzzy: bool) -> SearchPlan {
    SearchPlan {
        index: EMPLOYEES_INDEX,
        query: query_match_phrase_prefix(
            "engagements.title",
            value,
            includes(&["uuid", "name", "engagements"]),
        ),
        processor: None,
    }
}

/// Org unit by name: prefix match in both modes.
fn org_unit_by_name(value: &str, _fuzzy: bool) -> SearchPlan {
    SearchPlan {
        index: ORG_UNITS_INDEX,
        query: query_match_phrase_prefix("name", value, includes(&["uuid", "name", "addresses"])),
        processor: None,
    }
}

/// Org unit by KLE classification: nested query over the `kles` sub-list.
///
/// The result processor recombines the parent `{uuid, name}` source with
/// the matched inner subdocuments.
fn org_unit_by_kle(value: &str, _fuzzy: bool) -> SearchPlan {
    SearchPlan {
        index: ORG_UNITS_INDEX,
        query: SearchQuery {
            size: Some(KEYWORD_PAGE_SIZE),
            source: includes(&["uuid", "name"]),
            query: QueryKind::Nested {
                path: "kles".to_string(),
                inner_hits: InnerHits {
                    source: vec!["kles.title".to_string()],
                },
                query: Box::new(QueryKind::MatchPhrasePrefix(field("kles.title", value))),
            },
        },
        processor: Some(attach_inner_kles),
    }
}

/// Merge the matched KLE subdocuments back into the parent source.
fn attach_inner_kles(hit: &SearchHit) -> serde_json::Value {
    let mut document = hit.source.clone();
    if let Some(object) = document.as_object_mut() {
        object.insert(
            "kles".to_string(),
            serde_json::Value::Array(hit.inner_hits.clone()),
        );
    }
    document
}

/// A `match_all` query with a fixed result size and projection; used by the
/// list-all style lookups.
pub fn query_match_all(size: usize, fields: &[&str]) -> SearchQuery {
    SearchQuery {
        size: Some(size),
        source: includes(fields),
        query: QueryKind::MatchAll {},
    }
}
