//! HTTP surface of the phonebook service.

mod handlers;

use crate::config::{Config, DataloadAuth};
use crate::datastore::DataStore;
use crate::error::ServiceError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub datastore: Arc<DataStore>,
    pub company_name: String,
    pub dataload_auth: DataloadAuth,
}

impl AppState {
    pub fn new(datastore: Arc<DataStore>, config: &Config) -> Self {
        Self {
            datastore,
            company_name: config.company_name.clone(),
            dataload_auth: config.dataload_auth.clone(),
        }
    }
}

/// Build the service router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::status))
        .route("/api/status", get(handlers::status))
        .route("/api/org_units", get(handlers::all_org_units))
        .route("/api/org_unit/:uuid", get(handlers::org_unit_by_uuid))
        .route("/api/employee/:uuid", get(handlers::employee_by_uuid))
        .route(
            "/api/search",
            get(handlers::search_schema).post(handlers::search),
        )
        .route("/api/load-employees", post(handlers::load_employees))
        .route("/api/load-org-units", post(handlers::load_org_units))
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until shutdown.
pub async fn serve(state: AppState, bind_addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "phonebook service listening");
    axum::serve(listener, build_router(state)).await
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        // Internal detail is logged here and never shown to the caller
        if let ServiceError::Internal(detail) = &self {
            tracing::error!(%detail, "internal service error");
        }

        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
