//! Integration tests for the HTTP query API, driven through the router with
//! an in-memory index backend.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use os2phonebook::datastore::query::SearchQuery;
use os2phonebook::datastore::{
    IndexBackend, SearchOutcome, EMPLOYEES_INDEX, ORG_UNITS_INDEX,
};
use os2phonebook::{build_router, AppState, DataStore, DataloadAuth, DatastoreError, MemoryIndex};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

/// Delegating backend that counts search round trips.
struct CountingIndex {
    inner: MemoryIndex,
    searches: AtomicUsize,
}

impl CountingIndex {
    fn new() -> Self {
        Self {
            inner: MemoryIndex::new(),
            searches: AtomicUsize::new(0),
        }
    }

    fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }
}

impl IndexBackend for CountingIndex {
    fn ping(&self) -> bool {
        self.inner.ping()
    }

    fn get(&self, index: &str, id: &str) -> Result<Value, DatastoreError> {
        self.inner.get(index, id)
    }

    fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchOutcome, DatastoreError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        self.inner.search(index, query)
    }

    fn delete_index(&self, index: &str) -> Result<(), DatastoreError> {
        self.inner.delete_index(index)
    }

    fn bulk_insert(
        &self,
        index: &str,
        documents: &mut dyn Iterator<Item = (String, Value)>,
    ) -> Result<(usize, usize), DatastoreError> {
        self.inner.bulk_insert(index, documents)
    }
}

fn app(auth: DataloadAuth) -> (Router, Arc<DataStore>) {
    let datastore = Arc::new(DataStore::new(Arc::new(MemoryIndex::new())));
    let state = AppState {
        datastore: datastore.clone(),
        company_name: "Magenta ApS".to_string(),
        dataload_auth: auth,
    };
    (build_router(state), datastore)
}

fn employee_doc(uuid: &str, name: &str, phone: &str) -> (String, Value) {
    (
        uuid.to_string(),
        json!({
            "uuid": uuid,
            "name": name,
            "givenname": name.split(' ').next().unwrap_or(name),
            "surname": name.split(' ').last().unwrap_or(name),
            "addresses": {"PHONE": [{"description": "Telefon", "value": phone}]}
        }),
    )
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", username, password)))
}

#[tokio::test]
async fn test_status_reports_company_and_index_sizes() {
    let (router, datastore) = app(DataloadAuth::Disabled);
    datastore
        .load_index(EMPLOYEES_INDEX, vec![employee_doc("e1", "Emil Madsen", "2233")])
        .unwrap();

    let (status, body) = send(&router, get("/api/status")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["company_name"], "Magenta ApS");
    assert_eq!(body["employees"], 1);
    assert_eq!(body["org_units"], 0);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_search_schema_lists_every_intent() {
    let (router, _) = app(DataloadAuth::Disabled);

    let (status, body) = send(&router, get("/api/search")).await;

    assert_eq!(status, StatusCode::OK);
    for key in [
        "employee_by_name",
        "employee_by_phone",
        "employee_by_email",
        "employee_by_engagement",
        "org_unit_by_name",
        "org_unit_by_kle",
    ] {
        assert!(body[key]["description"].is_string(), "missing {}", key);
    }
}

#[tokio::test]
async fn test_search_broadens_only_when_the_narrow_pass_is_empty() {
    let (router, datastore) = app(DataloadAuth::Disabled);
    datastore
        .load_index(
            EMPLOYEES_INDEX,
            vec![
                employee_doc("e1", "Emil Madsen", "2233"),
                employee_doc("e2", "Mille Mortensen", "22337744"),
            ],
        )
        .unwrap();

    // An exact number only returns the exact holder
    let (status, body) = send(
        &router,
        post_json(
            "/api/search",
            &json!({"search_type": "employee_by_phone", "search_value": "2233"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["uuid"], "e1");

    // A partial number misses the narrow pass and broadens to both
    let (status, body) = send(
        &router,
        post_json(
            "/api/search",
            &json!({"search_type": "employee_by_phone", "search_value": "223"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_broadened_search_runs_exactly_once_and_only_on_empty_results() {
    let backend = Arc::new(CountingIndex::new());
    let datastore = Arc::new(DataStore::new(backend.clone()));
    let state = AppState {
        datastore: datastore.clone(),
        company_name: "Magenta ApS".to_string(),
        dataload_auth: DataloadAuth::Disabled,
    };
    let router = build_router(state);

    datastore
        .load_index(
            EMPLOYEES_INDEX,
            vec![
                employee_doc("e1", "Emil Madsen", "2233"),
                employee_doc("e2", "Mille Mortensen", "22337744"),
            ],
        )
        .unwrap();

    // Narrow hit: one index round trip, no broadening
    let (status, _) = send(
        &router,
        post_json(
            "/api/search",
            &json!({"search_type": "employee_by_phone", "search_value": "2233"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.searches(), 1);

    // Empty narrow pass: exactly one broadened retry, two round trips total
    let (status, body) = send(
        &router,
        post_json(
            "/api/search",
            &json!({"search_type": "employee_by_phone", "search_value": "223"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(backend.searches(), 3);

    // Nothing matches either pass: still only two round trips
    let (status, body) = send(
        &router,
        post_json(
            "/api/search",
            &json!({"search_type": "employee_by_phone", "search_value": "999"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
    assert_eq!(backend.searches(), 5);
}

#[tokio::test]
async fn test_search_with_no_matches_returns_an_empty_list() {
    let (router, _) = app(DataloadAuth::Disabled);

    let (status, body) = send(
        &router,
        post_json(
            "/api/search",
            &json!({"search_type": "employee_by_phone", "search_value": "999"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_unknown_search_type_is_rejected() {
    let (router, _) = app(DataloadAuth::Disabled);

    let (status, body) = send(
        &router,
        post_json(
            "/api/search",
            &json!({"search_type": "spaceship_types_by_name", "search_value": "Galaxy"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "InvalidSearchType");
    assert_eq!(
        body["error"]["message"],
        "Search type: spaceship_types_by_name is not available"
    );
}

#[tokio::test]
async fn test_search_with_missing_fields_is_rejected() {
    let (router, _) = app(DataloadAuth::Disabled);

    let (status, body) = send(
        &router,
        post_json("/api/search", &json!({"search_type": "employee_by_name"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "InvalidRequestBody");
}

#[tokio::test]
async fn test_search_with_malformed_json_is_rejected() {
    let (router, _) = app(DataloadAuth::Disabled);

    let request = Request::builder()
        .method("POST")
        .uri("/api/search")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "InvalidRequestBody");
}

#[tokio::test]
async fn test_unknown_route_gets_the_error_envelope() {
    let (router, _) = app(DataloadAuth::Disabled);

    let (status, body) = send(&router, get("/api/spaceships")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "NotFound");
}

#[tokio::test]
async fn test_employee_lookup_by_uuid() {
    let (router, datastore) = app(DataloadAuth::Disabled);
    datastore
        .load_index(EMPLOYEES_INDEX, vec![employee_doc("e1", "Emil Madsen", "2233")])
        .unwrap();

    let (status, body) = send(&router, get("/api/employee/e1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Emil Madsen");

    let (status, body) = send(&router, get("/api/employee/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["type"], "NotFound");
}

#[tokio::test]
async fn test_org_unit_listing_requires_a_loaded_phonebook() {
    let (router, datastore) = app(DataloadAuth::Disabled);

    // Empty index: the listing reports a failure rather than []
    let (status, body) = send(&router, get("/api/org_units")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["type"], "Internal");

    datastore
        .load_index(
            ORG_UNITS_INDEX,
            vec![(
                "u1".to_string(),
                json!({"uuid": "u1", "name": "Kolding Kommune", "parent": null}),
            )],
        )
        .unwrap();

    let (status, body) = send(&router, get("/api/org_units")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([{"uuid": "u1", "name": "Kolding Kommune", "parent": null}])
    );
}

#[tokio::test]
async fn test_load_endpoint_requires_credentials() {
    let auth = DataloadAuth::Basic {
        username: "dataloader".to_string(),
        password: "Password1".to_string(),
    };
    let (router, _) = app(auth);

    let documents = json!({"e1": employee_doc("e1", "Emil Madsen", "2233").1});

    // No header
    let (status, body) = send(&router, post_json("/api/load-employees", &documents)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["type"], "InvalidCredentials");

    // Wrong password
    let request = Request::builder()
        .method("POST")
        .uri("/api/load-employees")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, basic_auth("dataloader", "wrong"))
        .body(Body::from(documents.to_string()))
        .unwrap();
    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_load_endpoint_replaces_the_index() {
    let auth = DataloadAuth::Basic {
        username: "dataloader".to_string(),
        password: "Password1".to_string(),
    };
    let (router, datastore) = app(auth);
    datastore
        .load_index(EMPLOYEES_INDEX, vec![employee_doc("old", "Old Guard", "1111")])
        .unwrap();

    let documents = json!({"e1": employee_doc("e1", "Emil Madsen", "2233").1});
    let request = Request::builder()
        .method("POST")
        .uri("/api/load-employees")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, basic_auth("dataloader", "Password1"))
        .body(Body::from(documents.to_string()))
        .unwrap();

    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"indexed": 1, "total": 1}));

    assert!(datastore.get_employee("e1").is_ok());
    assert!(datastore.get_employee("old").is_err());
}

#[tokio::test]
async fn test_load_endpoint_rejects_non_object_bodies() {
    let auth = DataloadAuth::Basic {
        username: "dataloader".to_string(),
        password: "Password1".to_string(),
    };
    let (router, _) = app(auth);

    let request = Request::builder()
        .method("POST")
        .uri("/api/load-org-units")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, basic_auth("dataloader", "Password1"))
        .body(Body::from("[1, 2, 3]"))
        .unwrap();

    let (status, body) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "InvalidRequestBody");
}

#[tokio::test]
async fn test_load_disabled_when_no_credentials_configured() {
    let (router, _) = app(DataloadAuth::Disabled);

    let request = Request::builder()
        .method("POST")
        .uri("/api/load-employees")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, basic_auth("anyone", "anything"))
        .body(Body::from("{}"))
        .unwrap();

    let (status, _) = send(&router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
