//! The high level import routine: paginated employee import with bounded
//! concurrent enrichment.

use super::MoClient;
use crate::error::{MoApiError, MoApiResult};
use crate::models::{Employee, OrgUnit};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::sync::Arc;

/// Employees are paged out of OS2MO in fixed-size batches.
const BATCH_SIZE: usize = 250;

/// Import all employees and associated org units from OS2MO.
///
/// Employees are fetched in batches of [`BATCH_SIZE`]; within a batch,
/// enrichment (relation and address fetches) runs on a bounded worker pool
/// of `concurrency` blocking tasks. Org units are resolved lazily as
/// employees reference them, memoized inside the client.
///
/// Any remote error aborts the whole run; there is no partial-success
/// policy at this layer.
pub async fn import_routine(
    client: Arc<MoClient>,
    concurrency: usize,
) -> MoApiResult<(HashMap<String, Employee>, HashMap<String, OrgUnit>)> {
    let total = {
        let client = client.clone();
        tokio::task::spawn_blocking(move || client.total_employees())
            .await
            .map_err(join_error)??
    };

    tracing::info!(total, "starting OS2MO import");

    let mut employees = HashMap::new();
    let mut offset = 0;

    while offset <= total {
        let batch_end = (offset + BATCH_SIZE).min(total);
        tracing::info!(offset, batch_end, "importing employee batch");

        let batch = {
            let client = client.clone();
            tokio::task::spawn_blocking(move || client.employee_batch(offset, BATCH_SIZE))
                .await
                .map_err(join_error)??
        };

        let enriched: Vec<Option<Employee>> = stream::iter(batch)
            .map(|raw| {
                let client = client.clone();
                async move {
                    tokio::task::spawn_blocking(move || client.enrich_employee(raw))
                        .await
                        .map_err(join_error)?
                }
            })
            .buffer_unordered(concurrency.max(1))
            .try_collect()
            .await?;

        for employee in enriched.into_iter().flatten() {
            employees.insert(employee.uuid.clone(), employee);
        }

        offset += BATCH_SIZE;
    }

    let org_units = client.org_units();

    tracing::info!(
        employees = employees.len(),
        org_units = org_units.len(),
        "OS2MO import completed"
    );

    Ok((employees, org_units))
}

fn join_error(error: tokio::task::JoinError) -> MoApiError {
    MoApiError::HttpError(format!("Task join error: {}", error))
}
