//! Address classifier: groups raw OS2MO address details into fixed categories.

use crate::models::{AddressBook, AddressCategory, AddressEntry};
use serde::Deserialize;

/// Visibility marker on an address record.
#[derive(Debug, Clone, Deserialize)]
pub struct Visibility {
    pub scope: String,
}

/// Address type metadata on a raw record.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressType {
    /// Category discriminator, e.g. "PHONE"
    pub scope: String,

    /// Human readable label, e.g. "Telefon"
    pub name: String,
}

/// A raw address detail row as returned by `details/address`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAddress {
    pub address_type: AddressType,

    /// The formatted address value
    pub name: String,

    #[serde(default)]
    pub visibility: Option<Visibility>,
}

/// Visibility scope that excludes a record from every category.
const PROTECTED_SCOPE: &str = "SECRET";

/// Group raw address records by category.
///
/// Unknown scopes are logged and discarded; records marked `SECRET` are
/// skipped silently. Every category is present in the output, empty or not.
pub fn classify_addresses(records: &[RawAddress]) -> AddressBook {
    let mut book = AddressBook::default();

    for record in records {
        if let Some(visibility) = &record.visibility {
            if visibility.scope == PROTECTED_SCOPE {
                continue;
            }
        }

        let Some(category) = AddressCategory::from_scope(&record.address_type.scope) else {
            tracing::debug!(scope = %record.address_type.scope, "unknown address scope, discarding");
            continue;
        };

        book.push(
            category,
            AddressEntry {
                description: record.address_type.name.clone(),
                value: record.name.clone(),
            },
        );
    }

    book
}
