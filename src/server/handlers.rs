//! Request handlers.
//!
//! The datastore is synchronous; handlers hop onto the blocking pool for
//! every index round trip.

use super::AppState;
use crate::config::DataloadAuth;
use crate::datastore::{search_intents, EMPLOYEES_INDEX, ORG_UNITS_INDEX};
use crate::error::ServiceError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Uri};
use axum::Json;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Map, Value};

type HandlerResult = Result<Json<Value>, ServiceError>;

async fn run_blocking<T, F>(task: F) -> Result<T, ServiceError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ServiceError::Internal(e.to_string()))?
}

/// Service liveness and index sizes.
pub async fn status(State(state): State<AppState>) -> HandlerResult {
    let datastore = state.datastore.clone();
    let (employees, org_units) = run_blocking(move || {
        let employees = datastore.get_size(EMPLOYEES_INDEX)?;
        let org_units = datastore.get_size(ORG_UNITS_INDEX)?;
        Ok((employees, org_units))
    })
    .await?;

    Ok(Json(json!({
        "app": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "company_name": state.company_name,
        "employees": employees,
        "org_units": org_units,
    })))
}

/// Every org unit as a `{uuid, name, parent}` projection.
///
/// An empty org unit index means the phonebook was never loaded; that is
/// reported as a server-side failure, not an empty listing.
pub async fn all_org_units(State(state): State<AppState>) -> HandlerResult {
    let datastore = state.datastore.clone();
    let units = run_blocking(move || Ok(datastore.get_all_org_units()?)).await?;

    if units.is_empty() {
        tracing::warn!("org unit index is empty, has the phonebook been loaded?");
        return Err(ServiceError::Internal("org unit index is empty".to_string()));
    }

    Ok(Json(Value::Array(units)))
}

pub async fn org_unit_by_uuid(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> HandlerResult {
    let datastore = state.datastore.clone();
    let unit = run_blocking(move || Ok(datastore.get_org_unit(&uuid)?)).await?;
    Ok(Json(unit))
}

pub async fn employee_by_uuid(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
) -> HandlerResult {
    let datastore = state.datastore.clone();
    let employee = run_blocking(move || Ok(datastore.get_employee(&uuid)?)).await?;
    Ok(Json(employee))
}

/// The searchable intents and their descriptions.
pub async fn search_schema() -> Json<Value> {
    let schema: Map<String, Value> = search_intents()
        .iter()
        .map(|(key, intent)| {
            (
                key.to_string(),
                json!({"description": intent.description}),
            )
        })
        .collect();

    Json(Value::Object(schema))
}

/// Keyword search with a single broadened retry.
///
/// The narrow pass runs first; only when it returns nothing is the broad
/// variant tried, exactly once.
pub async fn search(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    let Json(body) = payload.map_err(|rejection| {
        ServiceError::InvalidRequestBody(rejection.body_text())
    })?;

    let search_type = required_string(&body, "search_type")?;
    let search_value = required_string(&body, "search_value")?;

    let datastore = state.datastore.clone();
    let results = run_blocking(move || {
        let narrow = datastore.search(&search_type, &search_value, false)?;
        if !narrow.is_empty() {
            return Ok(narrow);
        }
        Ok(datastore.search(&search_type, &search_value, true)?)
    })
    .await?;

    Ok(Json(Value::Array(results)))
}

pub async fn load_employees(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    load_documents(state, headers, payload, EMPLOYEES_INDEX).await
}

pub async fn load_org_units(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> HandlerResult {
    load_documents(state, headers, payload, ORG_UNITS_INDEX).await
}

/// Replace an index with the posted document map.
///
/// The body is an object keyed by uuid. The reply reports `(indexed, total)`
/// so the caller can see partial acceptance.
async fn load_documents(
    state: AppState,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
    index: &'static str,
) -> HandlerResult {
    authorize(&state.dataload_auth, &headers)?;

    let Json(body) = payload.map_err(|rejection| {
        ServiceError::InvalidRequestBody(rejection.body_text())
    })?;

    let Value::Object(documents) = body else {
        return Err(ServiceError::InvalidRequestBody(
            "Expected an object of documents keyed by uuid".to_string(),
        ));
    };

    let documents: Vec<(String, Value)> = documents.into_iter().collect();
    let count = documents.len();
    tracing::info!(index, count, "loading documents");

    let datastore = state.datastore.clone();
    let (indexed, total) =
        run_blocking(move || Ok(datastore.load_index(index, documents)?)).await?;

    Ok(Json(json!({"indexed": indexed, "total": total})))
}

pub async fn not_found(uri: Uri) -> ServiceError {
    ServiceError::NotFound(format!("No such endpoint: {}", uri.path()))
}

fn required_string(body: &Value, field: &str) -> Result<String, ServiceError> {
    body.get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            ServiceError::InvalidRequestBody(format!("Missing required field: {}", field))
        })
}

/// Validate the `Authorization: Basic` header against the configured
/// credentials. Every failure mode collapses to the same rejection.
fn authorize(auth: &DataloadAuth, headers: &HeaderMap) -> Result<(), ServiceError> {
    if matches!(auth, DataloadAuth::Disabled) {
        tracing::warn!("dataloader credentials are not configured, rejecting load request");
        return Err(ServiceError::InvalidCredentials);
    }

    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ServiceError::InvalidCredentials)?;

    let encoded = header
        .strip_prefix("Basic ")
        .ok_or(ServiceError::InvalidCredentials)?;

    let decoded = BASE64
        .decode(encoded)
        .map_err(|_| ServiceError::InvalidCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| ServiceError::InvalidCredentials)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(ServiceError::InvalidCredentials)?;

    if auth.verify(username, password) {
        Ok(())
    } else {
        Err(ServiceError::InvalidCredentials)
    }
}
