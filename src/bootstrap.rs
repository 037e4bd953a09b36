//! Import pipeline and datastore bootstrap: OS2MO import, normalization,
//! cache files and index loading.
//!
//! The cache files double as an offline hand-off format: a full import
//! writes them, and `--cache-only` replays them into the index without
//! touching OS2MO.

use crate::config::Config;
use crate::datastore::{DataStore, EMPLOYEES_INDEX, ORG_UNITS_INDEX};
use crate::error::{DatastoreError, MoApiError, NormalizeError};
use crate::mo::{import_routine, MoClient};
use crate::models::{Employee, OrgUnit};
use crate::normalize::{normalize_employee, normalize_org_unit};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Cache file holding the normalized employee documents, keyed by uuid.
pub const EMPLOYEE_CACHE: &str = "map_employees.json";

/// Cache file holding the normalized org unit documents, keyed by uuid.
pub const ORG_UNIT_CACHE: &str = "map_org_units.json";

/// Errors raised by the import pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("OS2MO import failed: {0}")]
    Import(#[from] MoApiError),

    #[error("normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("datastore load failed: {0}")]
    Datastore(#[from] DatastoreError),

    #[error("cache file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Full import: fetch everything from OS2MO, normalize, write the cache
/// files and replace both indices.
pub async fn run_import(config: &Config, datastore: &DataStore) -> Result<(), PipelineError> {
    let client = Arc::new(MoClient::new(config));
    let (employees, org_units) = import_routine(client, config.import_concurrency).await?;

    let employee_documents = normalize_employees(&employees)?;
    let org_unit_documents = normalize_org_units(&org_units)?;

    write_cache(&config.cache_root, EMPLOYEE_CACHE, &employee_documents)?;
    write_cache(&config.cache_root, ORG_UNIT_CACHE, &org_unit_documents)?;

    load_documents(datastore, EMPLOYEES_INDEX, employee_documents)?;
    load_documents(datastore, ORG_UNITS_INDEX, org_unit_documents)?;

    Ok(())
}

/// Replay previously written cache files into the indices, skipping OS2MO.
pub fn load_from_cache(config: &Config, datastore: &DataStore) -> Result<(), PipelineError> {
    let employee_documents = read_cache(&config.cache_root, EMPLOYEE_CACHE)?;
    let org_unit_documents = read_cache(&config.cache_root, ORG_UNIT_CACHE)?;

    load_documents(datastore, EMPLOYEES_INDEX, employee_documents)?;
    load_documents(datastore, ORG_UNITS_INDEX, org_unit_documents)?;

    Ok(())
}

/// Poll the datastore until it answers or the attempts run out.
pub async fn wait_for_datastore(
    datastore: Arc<DataStore>,
    max_attempts: u64,
    interval_secs: u64,
) -> bool {
    for attempt in 1..=max_attempts {
        let probe = datastore.clone();
        let up = tokio::task::spawn_blocking(move || probe.ping())
            .await
            .unwrap_or(false);

        if up {
            tracing::info!(attempt, "datastore is up");
            return true;
        }

        // No point sleeping after the last probe
        if attempt == max_attempts {
            break;
        }

        tracing::info!(attempt, max_attempts, "datastore not ready, retrying");
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
    }

    false
}

fn normalize_employees(
    employees: &HashMap<String, Employee>,
) -> Result<HashMap<String, Value>, PipelineError> {
    employees
        .values()
        .map(|employee| {
            let document = normalize_employee(employee)?;
            Ok((employee.uuid.clone(), serde_json::to_value(document)?))
        })
        .collect()
}

fn normalize_org_units(
    units: &HashMap<String, OrgUnit>,
) -> Result<HashMap<String, Value>, PipelineError> {
    units
        .values()
        .map(|unit| {
            let document = normalize_org_unit(unit, units)?;
            Ok((unit.uuid.clone(), serde_json::to_value(document)?))
        })
        .collect()
}

fn write_cache(
    root: &Path,
    file: &str,
    documents: &HashMap<String, Value>,
) -> Result<(), PipelineError> {
    fs::create_dir_all(root)?;
    let path = root.join(file);
    fs::write(&path, serde_json::to_string_pretty(documents)?)?;
    tracing::info!(path = %path.display(), count = documents.len(), "cache file written");
    Ok(())
}

fn read_cache(root: &Path, file: &str) -> Result<HashMap<String, Value>, PipelineError> {
    let path = root.join(file);
    let contents = fs::read_to_string(&path)?;
    let documents: HashMap<String, Value> = serde_json::from_str(&contents)?;
    tracing::info!(path = %path.display(), count = documents.len(), "cache file read");
    Ok(documents)
}

fn load_documents(
    datastore: &DataStore,
    index: &str,
    documents: HashMap<String, Value>,
) -> Result<(), PipelineError> {
    let (indexed, total) = datastore.load_index(index, documents)?;
    if indexed < total {
        tracing::warn!(index, indexed, total, "some documents were rejected during load");
    }
    Ok(())
}
