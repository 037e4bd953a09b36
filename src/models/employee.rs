//! Employee models: the enriched import form and the flattened index form.

use super::{AddressBook, RelationRef};
use serde::{Deserialize, Serialize};

/// An employee as assembled by the import client.
///
/// Relation lists reference org units. An employee only exists in the
/// imported set if at least one of `engagements`, `associations` or
/// `management` is non-empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub uuid: String,
    pub name: String,
    pub givenname: String,
    pub surname: String,
    pub addresses: AddressBook,
    pub engagements: Vec<RelationRef>,
    pub associations: Vec<RelationRef>,
    pub management: Vec<RelationRef>,
}

/// The search-ready employee document: the employee plus its deterministic
/// key-sorted JSON snapshot under `document`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeDocument {
    pub uuid: String,
    pub name: String,
    pub givenname: String,
    pub surname: String,
    pub addresses: AddressBook,
    pub engagements: Vec<RelationRef>,
    pub associations: Vec<RelationRef>,
    pub management: Vec<RelationRef>,
    #[serde(default)]
    pub document: String,
}
