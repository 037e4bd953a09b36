//! Client for importing org units and employees from the OS2MO service API.
//!
//! The client is synchronous (`ureq`) and is driven from async contexts via
//! `tokio::task::spawn_blocking`; see [`import::import_routine`]. Org units
//! are resolved lazily as employees reference them and memoized in a shared
//! synchronized map so concurrent enrichment never refetches a unit.

mod addresses;
mod import;

pub use addresses::{classify_addresses, RawAddress};
pub use import::import_routine;

use crate::config::Config;
use crate::error::{MoApiError, MoApiResult};
use crate::models::{AddressBook, Employee, KleRef, OrgUnit, RelationRef};
use once_cell::sync::OnceCell;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A `{name, uuid}` reference in an OS2MO payload.
#[derive(Debug, Clone, Deserialize)]
struct Named {
    name: String,
    uuid: String,
}

/// A payload object of which only the display name matters.
#[derive(Debug, Clone, Deserialize)]
struct TypedName {
    name: String,
}

/// An employee row from the paginated listing, before enrichment.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEmployee {
    pub uuid: String,
    pub name: String,
    #[serde(default)]
    pub givenname: String,
    #[serde(default)]
    pub surname: String,
}

#[derive(Debug, Deserialize)]
struct EmployeePage {
    #[serde(default)]
    total: usize,
    #[serde(default)]
    items: Vec<RawEmployee>,
}

#[derive(Debug, Deserialize)]
struct RawOrgUnit {
    uuid: String,
    name: String,
    #[serde(default)]
    parent: Option<Named>,
}

/// Employee-side relation row: references the org unit.
#[derive(Debug, Deserialize)]
struct EmployeeRelation {
    #[serde(alias = "association_type", alias = "manager_type")]
    job_function: TypedName,
    org_unit: Named,
}

/// Org-unit-side relation row: references the person, which may be vacant.
#[derive(Debug, Deserialize)]
struct UnitRelation {
    #[serde(alias = "association_type", alias = "manager_type")]
    job_function: TypedName,
    #[serde(default)]
    person: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct RawKle {
    kle_number: Named,
}

/// Client for the OS2MO service API.
///
/// Purely query-based; the remote is never mutated. Any non-success response
/// raises immediately and aborts the surrounding import run.
pub struct MoClient {
    base_url: String,
    agent: ureq::Agent,
    api_token: Option<String>,
    organisation_uuid: OnceCell<String>,
    org_units: Mutex<HashMap<String, Arc<OnceCell<OrgUnit>>>>,
}

impl MoClient {
    /// Create a client from configuration.
    pub fn new(config: &Config) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.request_timeout))
            .build();

        Self {
            base_url: config.mo_url.clone(),
            agent,
            api_token: config.mo_token.clone(),
            organisation_uuid: OnceCell::new(),
            org_units: Mutex::new(HashMap::new()),
        }
    }

    /// Create a client with a custom base URL (useful for testing).
    #[doc(hidden)]
    pub fn with_base_url(base_url: String, api_token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();

        Self {
            base_url,
            agent,
            api_token,
            organisation_uuid: OnceCell::new(),
            org_units: Mutex::new(HashMap::new()),
        }
    }

    fn build_url(&self, resource: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let resource = resource.trim_start_matches('/');
        format!("{}/{}", base, resource)
    }

    /// Execute a GET request against a service resource.
    fn get_json(&self, resource: &str, params: &[(&str, String)]) -> MoApiResult<serde_json::Value> {
        let url = self.build_url(resource);

        let mut request = self.agent.get(&url);
        if let Some(token) = &self.api_token {
            request = request.set("SESSION", token);
        }
        for (key, value) in params {
            request = request.query(key, value);
        }

        let response = request.call().map_err(map_error)?;
        response
            .into_json::<serde_json::Value>()
            .map_err(|e| MoApiError::HttpError(e.to_string()))
    }

    /// Resolve the main organisation identifier.
    ///
    /// The first organisation in `service/o/` is assumed to be the main one;
    /// an empty listing is fatal. Resolved at most once per client.
    pub fn organisation_uuid(&self) -> MoApiResult<&str> {
        self.organisation_uuid
            .get_or_try_init(|| {
                let listing: Vec<Named> =
                    serde_json::from_value(self.get_json("service/o/", &[])?)?;
                listing
                    .into_iter()
                    .next()
                    .map(|org| org.uuid)
                    .ok_or(MoApiError::MissingOrganisation)
            })
            .map(String::as_str)
    }

    /// Total number of employees in the main organisation (single probe request).
    pub fn total_employees(&self) -> MoApiResult<usize> {
        let org = self.organisation_uuid()?.to_string();
        let resource = format!("service/o/{}/e", org);
        let page: EmployeePage = serde_json::from_value(
            self.get_json(&resource, &[("limit", "1".to_string())])?,
        )?;
        Ok(page.total)
    }

    /// One batch of unenriched employees at the given offset.
    pub fn employee_batch(&self, offset: usize, batch_size: usize) -> MoApiResult<Vec<RawEmployee>> {
        let org = self.organisation_uuid()?.to_string();
        let resource = format!("service/o/{}/e", org);
        let page: EmployeePage = serde_json::from_value(self.get_json(
            &resource,
            &[
                ("start", offset.to_string()),
                ("limit", batch_size.to_string()),
            ],
        )?)?;
        Ok(page.items)
    }

    /// Fetch relation details and addresses for one employee.
    ///
    /// Returns `None` when the employee has no engagement, association or
    /// management role: such employees have no organisational anchor and are
    /// excluded from the imported set.
    pub fn enrich_employee(&self, raw: RawEmployee) -> MoApiResult<Option<Employee>> {
        let engagements = self.employee_relations(&raw.uuid, "engagement")?;
        let associations = self.employee_relations(&raw.uuid, "association")?;
        let management = self.employee_relations(&raw.uuid, "manager")?;

        if engagements.is_empty() && associations.is_empty() && management.is_empty() {
            tracing::debug!(employee = %raw.uuid, "skipping employee with no org unit relations");
            return Ok(None);
        }

        let addresses = self.employee_addresses(&raw.uuid)?;

        Ok(Some(Employee {
            uuid: raw.uuid,
            name: raw.name,
            givenname: raw.givenname,
            surname: raw.surname,
            addresses,
            engagements,
            associations,
            management,
        }))
    }

    /// Fetch one relation detail list for an employee, resolving (and
    /// memoizing) every referenced org unit and its ancestors.
    fn employee_relations(&self, uuid: &str, detail: &str) -> MoApiResult<Vec<RelationRef>> {
        let resource = format!("service/e/{}/details/{}", uuid, detail);
        let rows: Vec<EmployeeRelation> = serde_json::from_value(self.get_json(&resource, &[])?)?;

        for row in &rows {
            self.ensure_org_unit(&row.org_unit.uuid)?;
        }

        Ok(rows
            .into_iter()
            .map(|row| RelationRef {
                title: row.job_function.name,
                name: Some(row.org_unit.name),
                uuid: Some(row.org_unit.uuid),
            })
            .collect())
    }

    /// Classified addresses for an employee.
    pub fn employee_addresses(&self, uuid: &str) -> MoApiResult<AddressBook> {
        let resource = format!("service/e/{}/details/address", uuid);
        let rows: Vec<RawAddress> = serde_json::from_value(self.get_json(&resource, &[])?)?;
        Ok(classify_addresses(&rows))
    }

    /// Resolve an org unit and, transitively, every ancestor up to the root.
    ///
    /// Resolution is memoized in a shared map of once-cells keyed by uuid, so
    /// a unit referenced from many employees is fetched once even under
    /// concurrent enrichment. The ascension is iterative with a visited set:
    /// a cycle in the source data is a detected error, never an infinite loop.
    pub fn ensure_org_unit(&self, uuid: &str) -> MoApiResult<()> {
        let mut next = Some(uuid.to_string());
        let mut visited = HashSet::new();

        while let Some(current) = next {
            if !visited.insert(current.clone()) {
                return Err(MoApiError::ParentCycle(current));
            }

            let cell = {
                let mut map = self
                    .org_units
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                map.entry(current.clone()).or_default().clone()
            };

            // The lock is released before fetching; the cell serializes
            // concurrent initializers for the same unit.
            let unit = cell.get_or_try_init(|| self.fetch_org_unit(&current))?;
            next = unit.parent.clone();
        }

        Ok(())
    }

    /// Fetch and enrich a single org unit (no ancestor resolution).
    fn fetch_org_unit(&self, uuid: &str) -> MoApiResult<OrgUnit> {
        let resource = format!("service/ou/{}", uuid);
        let raw: RawOrgUnit = serde_json::from_value(self.get_json(&resource, &[])?)?;

        Ok(OrgUnit {
            addresses: self.org_unit_addresses(uuid)?,
            engagements: self.org_unit_relations(uuid, "engagement")?,
            associations: self.org_unit_relations(uuid, "association")?,
            management: self.org_unit_relations(uuid, "manager")?,
            kles: self.org_unit_kles(uuid)?,
            uuid: raw.uuid,
            name: raw.name,
            parent: raw.parent.map(|p| p.uuid),
        })
    }

    /// Fetch one relation detail list for an org unit.
    ///
    /// A vacant manager position (no person) is kept with null name/uuid
    /// rather than dropped.
    fn org_unit_relations(&self, uuid: &str, detail: &str) -> MoApiResult<Vec<RelationRef>> {
        let resource = format!("service/ou/{}/details/{}", uuid, detail);
        let rows: Vec<UnitRelation> = serde_json::from_value(self.get_json(&resource, &[])?)?;

        Ok(rows
            .into_iter()
            .map(|row| RelationRef {
                title: row.job_function.name,
                name: row.person.as_ref().map(|p| p.name.clone()),
                uuid: row.person.map(|p| p.uuid),
            })
            .collect())
    }

    /// Classified addresses for an org unit.
    fn org_unit_addresses(&self, uuid: &str) -> MoApiResult<AddressBook> {
        let resource = format!("service/ou/{}/details/address", uuid);
        let rows: Vec<RawAddress> = serde_json::from_value(self.get_json(&resource, &[])?)?;
        Ok(classify_addresses(&rows))
    }

    /// KLE task classifications for an org unit.
    fn org_unit_kles(&self, uuid: &str) -> MoApiResult<Vec<KleRef>> {
        let resource = format!("service/ou/{}/details/kle", uuid);
        let rows: Vec<RawKle> = serde_json::from_value(self.get_json(&resource, &[])?)?;

        Ok(rows
            .into_iter()
            .map(|row| KleRef {
                title: row.kle_number.name,
                uuid: row.kle_number.uuid,
            })
            .collect())
    }

    /// Drain the memoized org units resolved during the run.
    pub fn org_units(&self) -> HashMap<String, OrgUnit> {
        let map = self
            .org_units
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        map.iter()
            .filter_map(|(uuid, cell)| cell.get().map(|unit| (uuid.clone(), unit.clone())))
            .collect()
    }
}

fn map_error(error: ureq::Error) -> MoApiError {
    match error {
        ureq::Error::Status(code, response) => {
            let message = response
                .into_string()
                .unwrap_or_else(|_| "Unknown error".to_string());
            MoApiError::ApiError {
                status: code,
                message,
            }
        }
        ureq::Error::Transport(transport) => MoApiError::HttpError(transport.to_string()),
    }
}
