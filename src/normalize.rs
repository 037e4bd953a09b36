//! Document normalizer: turns enriched import records into self-contained,
//! search-ready index documents.
//!
//! Each document embeds a deterministic key-sorted JSON snapshot of itself
//! under `document`, used as a stable fingerprint by keyword-oriented
//! stores and as redundant metadata elsewhere.

use crate::error::NormalizeError;
use crate::models::{Employee, EmployeeDocument, OrgUnit, OrgUnitDocument};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Resolve the uuid of the organisational root by walking the parent chain.
///
/// The walk is iterative with a visited set: a self-referential or circular
/// chain in the source data is reported as an error instead of looping. A
/// parentless unit is its own root.
pub fn resolve_root(
    uuid: &str,
    units: &HashMap<String, OrgUnit>,
) -> Result<String, NormalizeError> {
    let mut current = uuid.to_string();
    let mut visited = HashSet::new();

    loop {
        if !visited.insert(current.clone()) {
            return Err(NormalizeError::ParentCycle(current));
        }

        let unit = units
            .get(&current)
            .ok_or_else(|| NormalizeError::UnknownParent {
                unit: uuid.to_string(),
                parent: current.clone(),
            })?;

        match &unit.parent {
            Some(parent) => current = parent.clone(),
            None => return Ok(unit.uuid.clone()),
        }
    }
}

/// Deterministic serialized form of a document: JSON with object keys
/// sorted, the `document` field itself excluded.
fn snapshot<T: Serialize>(record: &T) -> Result<String, NormalizeError> {
    // serde_json's default map is ordered by key, which makes the
    // serialization stable across runs on identical input.
    let mut value = serde_json::to_value(record)?;
    if let Some(object) = value.as_object_mut() {
        object.remove("document");
    }
    Ok(serde_json::to_string(&value)?)
}

/// Flatten an enriched employee into its index document.
pub fn normalize_employee(employee: &Employee) -> Result<EmployeeDocument, NormalizeError> {
    let mut document = EmployeeDocument {
        uuid: employee.uuid.clone(),
        name: employee.name.clone(),
        givenname: employee.givenname.clone(),
        surname: employee.surname.clone(),
        addresses: employee.addresses.clone(),
        engagements: employee.engagements.clone(),
        associations: employee.associations.clone(),
        management: employee.management.clone(),
        document: String::new(),
    };

    document.document = snapshot(&document)?;
    Ok(document)
}

/// Flatten an enriched org unit into its index document, resolving the
/// organisational root against the full set of imported units.
pub fn normalize_org_unit(
    unit: &OrgUnit,
    units: &HashMap<String, OrgUnit>,
) -> Result<OrgUnitDocument, NormalizeError> {
    let root = resolve_root(&unit.uuid, units)?;

    let mut document = OrgUnitDocument {
        uuid: unit.uuid.clone(),
        name: unit.name.clone(),
        parent: unit.parent.clone(),
        root,
        addresses: unit.addresses.clone(),
        engagements: unit.engagements.clone(),
        associations: unit.associations.clone(),
        management: unit.management.clone(),
        kles: unit.kles.clone(),
        document: String::new(),
    };

    document.document = snapshot(&document)?;
    Ok(document)
}
