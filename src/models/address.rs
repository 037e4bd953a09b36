//! Categorized contact/address records.

use serde::{Deserialize, Serialize};

/// A single contact record, e.g. `{"description": "Email", "value": "info@magenta.dk"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    /// Human readable label from the address type
    pub description: String,

    /// The address value itself
    pub value: String,
}

/// The fixed set of address categories, keyed by OS2MO address-type scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AddressCategory {
    /// Residential/physical address
    Dar,
    /// Phone number
    Phone,
    /// Email address
    Email,
    /// European Article Numbering (business registration)
    Ean,
    /// Web address
    Www,
    /// P-number (other registration)
    Pnumber,
}

impl AddressCategory {
    /// Map an OS2MO address-type scope to a category. Unknown scopes yield `None`.
    pub fn from_scope(scope: &str) -> Option<Self> {
        match scope {
            "DAR" => Some(AddressCategory::Dar),
            "PHONE" => Some(AddressCategory::Phone),
            "EMAIL" => Some(AddressCategory::Email),
            "EAN" => Some(AddressCategory::Ean),
            "WWW" => Some(AddressCategory::Www),
            "PNUMBER" => Some(AddressCategory::Pnumber),
            _ => None,
        }
    }
}

/// All contact records for one entity, grouped by category.
///
/// Every category is always present, empty or not, so consumers never have
/// to probe for missing keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBook {
    #[serde(rename = "DAR", default)]
    pub dar: Vec<AddressEntry>,

    #[serde(rename = "PHONE", default)]
    pub phone: Vec<AddressEntry>,

    #[serde(rename = "EMAIL", default)]
    pub email: Vec<AddressEntry>,

    #[serde(rename = "EAN", default)]
    pub ean: Vec<AddressEntry>,

    #[serde(rename = "WWW", default)]
    pub www: Vec<AddressEntry>,

    #[serde(rename = "PNUMBER", default)]
    pub pnumber: Vec<AddressEntry>,
}

impl AddressBook {
    /// Append an entry to the given category.
    pub fn push(&mut self, category: AddressCategory, entry: AddressEntry) {
        match category {
            AddressCategory::Dar => self.dar.push(entry),
            AddressCategory::Phone => self.phone.push(entry),
            AddressCategory::Email => self.email.push(entry),
            AddressCategory::Ean => self.ean.push(entry),
            AddressCategory::Www => self.www.push(entry),
            AddressCategory::Pnumber => self.pnumber.push(entry),
        }
    }

    /// Total number of entries across all categories.
    pub fn len(&self) -> usize {
        self.dar.len()
            + self.phone.len()
            + self.email.len()
            + self.ean.len()
            + self.www.len()
            + self.pnumber.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
