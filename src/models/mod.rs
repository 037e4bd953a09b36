//! Data structures for org units, employees and their flattened index forms.

mod address;
mod employee;
mod org_unit;

pub use address::{AddressBook, AddressCategory, AddressEntry};
pub use employee::{Employee, EmployeeDocument};
pub use org_unit::{KleRef, OrgUnit, OrgUnitDocument};

use serde::{Deserialize, Serialize};

/// A flattened relation projection.
///
/// On an employee the reference points at an org unit (`name`/`uuid` are the
/// unit's); on an org unit it points at a person. A vacant manager position
/// keeps its title but carries `name: null, uuid: null` — distinguishing a
/// vacant position from no position at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRef {
    /// Job function, association type or manager type name
    pub title: String,

    /// Display name of the referenced entity
    pub name: Option<String>,

    /// Identifier of the referenced entity
    pub uuid: Option<String>,
}
