//! Integration tests for the OS2MO client using mockito for HTTP mocking.

use mockito::{Matcher, Mock, Server, ServerGuard};
use os2phonebook::mo::{import_routine, RawEmployee};
use os2phonebook::{MoApiError, MoClient};
use std::sync::Arc;

fn client_for(server: &ServerGuard) -> MoClient {
    MoClient::with_base_url(server.url(), None)
}

fn mock_organisation(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/service/o/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"name": "Kolding Kommune", "uuid": "org1"}]"#)
        .create()
}

/// Mock one org unit and all of its (empty) detail listings.
fn mock_org_unit(
    server: &mut ServerGuard,
    uuid: &str,
    name: &str,
    parent: Option<&str>,
) -> Vec<Mock> {
    let parent_json = match parent {
        Some(parent) => format!(r#"{{"name": "Parent", "uuid": "{}"}}"#, parent),
        None => "null".to_string(),
    };

    let mut mocks = vec![server
        .mock("GET", format!("/service/ou/{}", uuid).as_str())
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(format!(
            r#"{{"uuid": "{}", "name": "{}", "parent": {}}}"#,
            uuid, name, parent_json
        ))
        .expect(1)
        .create()];

    for detail in ["address", "engagement", "association", "manager", "kle"] {
        mocks.push(
            server
                .mock(
                    "GET",
                    format!("/service/ou/{}/details/{}", uuid, detail).as_str(),
                )
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body("[]")
                .create(),
        );
    }

    mocks
}

fn mock_employee_detail(server: &mut ServerGuard, uuid: &str, detail: &str, body: &str) -> Mock {
    server
        .mock(
            "GET",
            format!("/service/e/{}/details/{}", uuid, detail).as_str(),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create()
}

fn raw_employee(uuid: &str, name: &str) -> RawEmployee {
    RawEmployee {
        uuid: uuid.to_string(),
        name: name.to_string(),
        givenname: name.split(' ').next().unwrap_or(name).to_string(),
        surname: name.split(' ').last().unwrap_or(name).to_string(),
    }
}

#[test]
fn test_organisation_uuid_resolved_once() {
    let mut server = Server::new();
    let mock = mock_organisation(&mut server);

    let client = client_for(&server);
    assert_eq!(client.organisation_uuid().unwrap(), "org1");
    assert_eq!(client.organisation_uuid().unwrap(), "org1");

    // The listing is fetched once and memoized
    mock.assert();
}

#[test]
fn test_empty_organisation_listing_is_fatal() {
    let mut server = Server::new();
    server
        .mock("GET", "/service/o/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create();

    let client = client_for(&server);
    assert!(matches!(
        client.organisation_uuid(),
        Err(MoApiError::MissingOrganisation)
    ));
}

#[test]
fn test_employee_batch_pagination_params() {
    let mut server = Server::new();
    mock_organisation(&mut server);

    let mock = server
        .mock("GET", "/service/o/org1/e")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("start".into(), "250".into()),
            Matcher::UrlEncoded("limit".into(), "250".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"total": 421, "items": [{"uuid": "e1", "name": "Emil Madsen",
                "givenname": "Emil", "surname": "Madsen"}]}"#,
        )
        .create();

    let client = client_for(&server);
    let batch = client.employee_batch(250, 250).unwrap();

    mock.assert();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].uuid, "e1");
}

#[test]
fn test_enrich_skips_employee_without_relations() {
    let mut server = Server::new();

    for detail in ["engagement", "association", "manager"] {
        mock_employee_detail(&mut server, "e1", detail, "[]");
    }

    // The address lookup is skipped entirely for anchorless employees
    let address_mock = server
        .mock("GET", "/service/e/e1/details/address")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .expect(0)
        .create();

    let client = client_for(&server);
    let enriched = client.enrich_employee(raw_employee("e1", "Emil Madsen")).unwrap();

    assert!(enriched.is_none());
    address_mock.assert();
}

#[test]
fn test_enrich_employee_resolves_org_unit_ancestry() {
    let mut server = Server::new();

    mock_employee_detail(
        &mut server,
        "e1",
        "engagement",
        r#"[{"job_function": {"name": "Software Udvikler"},
             "org_unit": {"name": "Teknisk Support", "uuid": "ou1"}}]"#,
    );
    mock_employee_detail(&mut server, "e1", "association", "[]");
    mock_employee_detail(&mut server, "e1", "manager", "[]");
    mock_employee_detail(&mut server, "e1", "address", "[]");

    let unit_mocks = mock_org_unit(&mut server, "ou1", "Teknisk Support", Some("root"));
    mock_org_unit(&mut server, "root", "Kolding Kommune", None);

    let client = client_for(&server);
    let employee = client
        .enrich_employee(raw_employee("e1", "Emil Madsen"))
        .unwrap()
        .expect("employee with an engagement is kept");

    assert_eq!(employee.engagements.len(), 1);
    assert_eq!(employee.engagements[0].title, "Software Udvikler");
    assert_eq!(
        employee.engagements[0].name.as_deref(),
        Some("Teknisk Support")
    );
    assert_eq!(employee.engagements[0].uuid.as_deref(), Some("ou1"));

    // The unit and its ancestor were both resolved and memoized
    let units = client.org_units();
    assert_eq!(units.len(), 2);
    assert_eq!(units["ou1"].parent.as_deref(), Some("root"));
    assert_eq!(units["root"].parent, None);
    unit_mocks[0].assert();
}

#[test]
fn test_org_unit_is_fetched_once_across_employees() {
    let mut server = Server::new();

    let engagement = r#"[{"job_function": {"name": "Underviser"},
        "org_unit": {"name": "Byhaveskolen", "uuid": "ou1"}}]"#;

    for uuid in ["e1", "e2"] {
        mock_employee_detail(&mut server, uuid, "engagement", engagement);
        mock_employee_detail(&mut server, uuid, "association", "[]");
        mock_employee_detail(&mut server, uuid, "manager", "[]");
        mock_employee_detail(&mut server, uuid, "address", "[]");
    }

    let unit_mocks = mock_org_unit(&mut server, "ou1", "Byhaveskolen", None);

    let client = client_for(&server);
    client
        .enrich_employee(raw_employee("e1", "Anders And"))
        .unwrap();
    client
        .enrich_employee(raw_employee("e2", "Mille Mortensen"))
        .unwrap();

    // expect(1) on the unit fetch: the second employee hits the memo
    unit_mocks[0].assert();
}

#[test]
fn test_secret_addresses_never_reach_the_employee() {
    let mut server = Server::new();

    mock_employee_detail(
        &mut server,
        "e1",
        "engagement",
        r#"[{"job_function": {"name": "Underviser"},
             "org_unit": {"name": "Byhaveskolen", "uuid": "ou1"}}]"#,
    );
    mock_employee_detail(&mut server, "e1", "association", "[]");
    mock_employee_detail(&mut server, "e1", "manager", "[]");
    mock_employee_detail(
        &mut server,
        "e1",
        "address",
        r#"[{"address_type": {"scope": "PHONE", "name": "Telefon"},
             "name": "2233", "visibility": {"scope": "SECRET"}},
            {"address_type": {"scope": "EMAIL", "name": "Email"},
             "name": "emil@example.org"}]"#,
    );
    mock_org_unit(&mut server, "ou1", "Byhaveskolen", None);

    let client = client_for(&server);
    let employee = client
        .enrich_employee(raw_employee("e1", "Emil Madsen"))
        .unwrap()
        .unwrap();

    assert!(employee.addresses.phone.is_empty());
    assert_eq!(employee.addresses.email.len(), 1);
    assert_eq!(employee.addresses.email[0].value, "emil@example.org");
}

#[test]
fn test_vacant_manager_position_is_kept() {
    let mut server = Server::new();

    mock_employee_detail(
        &mut server,
        "e1",
        "engagement",
        r#"[{"job_function": {"name": "Underviser"},
             "org_unit": {"name": "Byhaveskolen", "uuid": "ou1"}}]"#,
    );
    mock_employee_detail(&mut server, "e1", "association", "[]");
    mock_employee_detail(&mut server, "e1", "manager", "[]");
    mock_employee_detail(&mut server, "e1", "address", "[]");

    // Hand-rolled unit mocks: the manager listing has a vacant position
    server
        .mock("GET", "/service/ou/ou1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"uuid": "ou1", "name": "Byhaveskolen", "parent": null}"#)
        .create();
    for detail in ["address", "engagement", "association", "kle"] {
        server
            .mock("GET", format!("/service/ou/ou1/details/{}", detail).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create();
    }
    server
        .mock("GET", "/service/ou/ou1/details/manager")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"manager_type": {"name": "Direktør"}, "person": null}]"#)
        .create();

    let client = client_for(&server);
    client
        .enrich_employee(raw_employee("e1", "Emil Madsen"))
        .unwrap();

    let units = client.org_units();
    let management = &units["ou1"].management;
    assert_eq!(management.len(), 1);
    assert_eq!(management[0].title, "Direktør");
    assert_eq!(management[0].name, None);
    assert_eq!(management[0].uuid, None);
}

#[test]
fn test_remote_error_aborts_enrichment() {
    let mut server = Server::new();

    server
        .mock("GET", "/service/e/e1/details/engagement")
        .with_status(500)
        .with_body("upstream exploded")
        .create();

    let client = client_for(&server);
    let result = client.enrich_employee(raw_employee("e1", "Emil Madsen"));

    assert!(matches!(
        result,
        Err(MoApiError::ApiError { status: 500, .. })
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_import_routine_end_to_end() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/service/o/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"name": "Kolding Kommune", "uuid": "org1"}]"#)
        .create_async()
        .await;

    // Probe request for the total
    server
        .mock("GET", "/service/o/org1/e")
        .match_query(Matcher::UrlEncoded("limit".into(), "1".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"total": 2, "items": []}"#)
        .create_async()
        .await;

    // The single batch holding both employees
    server
        .mock("GET", "/service/o/org1/e")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("start".into(), "0".into()),
            Matcher::UrlEncoded("limit".into(), "250".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"total": 2, "items": [
                {"uuid": "e1", "name": "Emil Madsen", "givenname": "Emil", "surname": "Madsen"},
                {"uuid": "e2", "name": "Solo Flyver", "givenname": "Solo", "surname": "Flyver"}
            ]}"#,
        )
        .create_async()
        .await;

    // e1 has an engagement; e2 has nothing and is dropped
    server
        .mock("GET", "/service/e/e1/details/engagement")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"job_function": {"name": "Underviser"},
                 "org_unit": {"name": "Byhaveskolen", "uuid": "ou1"}}]"#,
        )
        .create_async()
        .await;
    for (uuid, detail) in [
        ("e1", "association"),
        ("e1", "manager"),
        ("e1", "address"),
        ("e2", "engagement"),
        ("e2", "association"),
        ("e2", "manager"),
    ] {
        server
            .mock(
                "GET",
                format!("/service/e/{}/details/{}", uuid, detail).as_str(),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;
    }

    server
        .mock("GET", "/service/ou/ou1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"uuid": "ou1", "name": "Byhaveskolen", "parent": null}"#)
        .create_async()
        .await;
    for detail in ["address", "engagement", "association", "manager", "kle"] {
        server
            .mock("GET", format!("/service/ou/ou1/details/{}", detail).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;
    }

    let client = Arc::new(MoClient::with_base_url(server.url(), None));
    let (employees, org_units) = import_routine(client, 4).await.unwrap();

    assert_eq!(employees.len(), 1);
    assert!(employees.contains_key("e1"));
    assert_eq!(org_units.len(), 1);
    assert!(org_units.contains_key("ou1"));
}
