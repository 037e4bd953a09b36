//! Org unit models: the enriched import form and the flattened index form.

use super::{AddressBook, RelationRef};
use serde::{Deserialize, Serialize};

/// A KLE task-classification reference attached to an org unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KleRef {
    /// Classification title, e.g. "Kommunens styrelse"
    pub title: String,

    /// Classification identifier
    pub uuid: String,
}

/// An org unit as assembled by the import client.
///
/// `parent` is `None` for the organisational root; exactly one root is
/// expected per organisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub uuid: String,
    pub name: String,
    pub parent: Option<String>,
    pub addresses: AddressBook,
    pub engagements: Vec<RelationRef>,
    pub associations: Vec<RelationRef>,
    pub management: Vec<RelationRef>,
    #[serde(default)]
    pub kles: Vec<KleRef>,
}

/// The search-ready org unit document.
///
/// `root` is the uuid of the organisational root reached by walking the
/// parent chain; a parentless unit is its own root. `document` holds the
/// deterministic key-sorted JSON snapshot of the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrgUnitDocument {
    pub uuid: String,
    pub name: String,
    pub parent: Option<String>,
    pub root: String,
    pub addresses: AddressBook,
    pub engagements: Vec<RelationRef>,
    pub associations: Vec<RelationRef>,
    pub management: Vec<RelationRef>,
    #[serde(default)]
    pub kles: Vec<KleRef>,
    #[serde(default)]
    pub document: String,
}
