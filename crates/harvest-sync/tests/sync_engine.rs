//! End-to-end runs of the engine against the in-process mock vendor.

mod common;

use std::time::Duration;

use chrono::Utc;
use common::{connect, engine, engine_with, MockVendor};
use harvest_core::{DataTable, ResourceKind, SpraySource, SyncStatus};
use harvest_sync::{SyncError, VendorClient};
use serde_json::json;

fn org(id: &str) -> serde_json::Value {
    json!({ "id": id, "name": format!("Org {}", id), "type": "customer", "links": [] })
}

// =============================================================================
// Paginated fetch
// =============================================================================

#[tokio::test]
async fn test_pages_are_followed_until_no_next_link() {
    let mock = MockVendor::start().await;
    mock.json(
        "/platform/things",
        json!({
            "values": [{ "id": "a" }],
            "links": [{ "rel": "nextPage", "uri": mock.url("/platform/things?page=2") }]
        }),
    );
    mock.json(
        "/platform/things?page=2",
        json!({
            "values": [{ "id": "b" }],
            "links": [
                { "rel": "self", "uri": mock.url("/platform/things?page=2") },
                { "rel": "nextPage", "uri": mock.url("/platform/things?page=3") }
            ]
        }),
    );
    mock.json("/platform/things?page=3", json!({ "values": [{ "id": "c" }] }));

    let client = VendorClient::new(&mock.config().vendor).unwrap();
    let page = client.fetch_all_pages("/things", "token").await.unwrap();

    let ids: Vec<&str> = page.records.iter().filter_map(|r| r["id"].as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    assert_eq!(page.total, 3);
}

#[tokio::test]
async fn test_failed_page_discards_earlier_pages() {
    let mock = MockVendor::start().await;
    mock.json(
        "/platform/things",
        json!({
            "values": [{ "id": "a" }],
            "links": [{ "rel": "nextPage", "uri": mock.url("/platform/things?page=2") }]
        }),
    );
    mock.fail("/platform/things?page=2", 500, "boom");

    let client = VendorClient::new(&mock.config().vendor).unwrap();
    let err = client.fetch_all_pages("/things", "token").await.unwrap_err();
    assert_eq!(err.status, 500);
    assert_eq!(err.message, "boom");
}

// =============================================================================
// Handlers
// =============================================================================

#[tokio::test]
async fn test_one_failing_org_does_not_stop_the_others() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values("/platform/organizations", json!([org("A"), org("B")]));
    mock.fail("/platform/organizations/A/fields", 500, "upstream down");
    mock.values(
        "/platform/organizations/B/fields",
        json!([
            { "id": "f1", "name": "North" },
            { "id": "f2", "name": "South" },
            { "id": "f3", "name": "East" },
            { "id": "f4", "name": "West" },
            { "id": "f5", "name": "Creek" }
        ]),
    );

    engine.sync_resource(ResourceKind::Organizations).await.unwrap();
    let report = engine.sync_resource(ResourceKind::Fields).await.unwrap();

    assert_eq!(report.synced, 5);
    assert_eq!(report.errors, vec!["Org A: HTTP 500: upstream down".to_string()]);
}

#[tokio::test]
async fn test_rerun_leaves_row_counts_unchanged() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values("/platform/organizations", json!([org("A")]));
    mock.values(
        "/platform/organizations/A/fields",
        json!([{ "id": "f1", "name": "North" }, { "id": "f2", "name": "South" }]),
    );

    for _ in 0..2 {
        engine.sync_resource(ResourceKind::Organizations).await.unwrap();
        engine.sync_resource(ResourceKind::Fields).await.unwrap();
    }

    let tables = engine.db().tables();
    assert_eq!(tables.count(DataTable::Organizations).await.unwrap(), 1);
    assert_eq!(tables.count(DataTable::Fields).await.unwrap(), 2);
}

#[tokio::test]
async fn test_boundaries_without_fields_persist_nothing() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    let report = engine.sync_resource(ResourceKind::Boundaries).await.unwrap();
    assert_eq!(report.synced, 0);
    assert!(report.errors.is_empty());
    assert_eq!(engine.db().tables().count(DataTable::Boundaries).await.unwrap(), 0);
}

#[tokio::test]
async fn test_records_without_id_are_skipped_and_reported() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values(
        "/platform/organizations",
        json!([org("A"), { "name": "Nameless" }]),
    );
    let report = engine.sync_resource(ResourceKind::Organizations).await.unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(report.errors.len(), 1);
}

#[tokio::test]
async fn test_equipment_falls_back_to_org_machines() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values("/platform/organizations", json!([org("A"), org("B")]));
    mock.fail("/platform/equipment", 404, "not here");
    mock.values(
        "/platform/organizations/A/machines",
        json!([{ "id": "eq-1", "name": "Tractor", "make": "Deere" }]),
    );
    mock.fail("/platform/organizations/B/machines", 403, "forbidden");

    engine.sync_resource(ResourceKind::Organizations).await.unwrap();
    let report = engine.sync_resource(ResourceKind::Equipment).await.unwrap();

    assert_eq!(report.synced, 1);
    assert_eq!(
        report.errors,
        vec![
            "Root endpoint failed: HTTP 404: not here".to_string(),
            "Org B: HTTP 403: forbidden".to_string(),
        ]
    );
    let eq = engine.db().equipment().get("eq-1").await.unwrap().unwrap();
    assert_eq!(eq.org_id.as_deref(), Some("A"));
}

#[tokio::test]
async fn test_root_equipment_endpoint_leaves_org_unset() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values(
        "/platform/equipment",
        json!([{ "id": "eq-1", "name": "Tractor", "make": "Deere" }]),
    );
    let report = engine.sync_resource(ResourceKind::Equipment).await.unwrap();

    assert_eq!(report.synced, 1);
    assert!(report.errors.is_empty());
    let eq = engine.db().equipment().get("eq-1").await.unwrap().unwrap();
    assert_eq!(eq.org_id, None);
    assert_eq!(mock.hits("/platform/organizations"), 0);
}

const FLEET_PAGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Fleet version="2">
  <Links><rel>self</rel><href>https://aemp.example/Fleet/1</href></Links>
  <Equipment>
    <EquipmentHeader>
      <OEMName>John Deere</OEMName>
      <Model>8R 410</Model>
      <EquipmentID>eq-1</EquipmentID>
    </EquipmentHeader>
    <FuelRemaining><Percent>42</Percent></FuelRemaining>
  </Equipment>
</Fleet>"#;

#[tokio::test]
async fn test_telemetry_merge_keeps_descriptive_columns() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values(
        "/platform/equipment",
        json!([{ "id": "eq-1", "name": "Tractor", "make": "Deere" }]),
    );
    mock.xml("/aemp/Fleet/1", FLEET_PAGE);

    engine.sync_resource(ResourceKind::Equipment).await.unwrap();
    let report = engine.sync_resource(ResourceKind::TelemetrySnapshot).await.unwrap();
    assert_eq!(report.synced, 1);

    let eq = engine.db().equipment().get("eq-1").await.unwrap().unwrap();
    assert_eq!(eq.make, "Deere");
    assert!((eq.fuel_remaining_ratio.unwrap() - 0.42).abs() < 1e-9);
    assert!(eq.telemetry_synced_at.is_some());
    assert_eq!(mock.hits("/aemp/Fleet/2"), 0);
}

fn fleet_page(page: u32, next: Option<u32>, equipment_id: &str, fuel_percent: u32) -> String {
    let next_link = next
        .map(|n| format!("<Links><rel>next</rel><href>https://aemp.example/Fleet/{}</href></Links>", n))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Fleet version="2">
  <Links><rel>self</rel><href>https://aemp.example/Fleet/{page}</href></Links>
  {next_link}
  <Equipment>
    <EquipmentHeader><EquipmentID>{equipment_id}</EquipmentID></EquipmentHeader>
    <FuelRemaining><Percent>{fuel_percent}</Percent></FuelRemaining>
  </Equipment>
</Fleet>"#
    )
}

#[tokio::test]
async fn test_fleet_feed_follows_later_pages() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values(
        "/platform/equipment",
        json!([{ "id": "eq-1", "name": "Tractor" }, { "id": "eq-2", "name": "Sprayer" }]),
    );
    mock.xml("/aemp/Fleet/1", &fleet_page(1, Some(2), "eq-1", 40));
    mock.xml("/aemp/Fleet/2", &fleet_page(2, None, "eq-2", 75));

    engine.sync_resource(ResourceKind::Equipment).await.unwrap();
    let report = engine.sync_resource(ResourceKind::TelemetrySnapshot).await.unwrap();
    assert_eq!(report.synced, 2);
    assert!(report.errors.is_empty());

    assert_eq!(mock.hits("/aemp/Fleet/1"), 1);
    assert_eq!(mock.hits("/aemp/Fleet/2"), 1);
    assert_eq!(mock.hits("/aemp/Fleet/3"), 0);

    let first = engine.db().equipment().get("eq-1").await.unwrap().unwrap();
    let second = engine.db().equipment().get("eq-2").await.unwrap().unwrap();
    assert!((first.fuel_remaining_ratio.unwrap() - 0.40).abs() < 1e-9);
    assert!((second.fuel_remaining_ratio.unwrap() - 0.75).abs() < 1e-9);
}

#[tokio::test]
async fn test_spray_operation_yields_one_vendor_application() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values("/platform/organizations", json!([org("A")]));
    mock.values(
        "/platform/organizations/A/fields",
        json!([{ "id": "f1", "name": "North" }]),
    );
    mock.values(
        "/platform/organizations/A/fields/f1/fieldOperations",
        json!([{
            "id": "op-1",
            "fieldOperationType": "Application",
            "startDate": "2024-06-01T08:00:00Z",
            "products": [{ "name": "Roundup" }]
        }]),
    );

    for _ in 0..2 {
        engine.sync_all().await.unwrap();
    }

    let applications = engine.db().inventory().list_applications("f1").await.unwrap();
    assert_eq!(applications.len(), 1);
    assert_eq!(applications[0].product_name, "Roundup");
    assert_eq!(applications[0].source, SpraySource::Vendor);
    assert_eq!(applications[0].operation_id.as_deref(), Some("op-1"));
}

#[tokio::test]
async fn test_location_history_advances_last_location() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values("/platform/equipment", json!([{ "id": "eq-1", "name": "Tractor" }]));
    mock.values(
        "/platform/machines/eq-1/locationHistory",
        json!([
            { "point": { "lat": 41.0, "lon": -93.0 }, "eventTimestamp": "2024-07-01T10:00:00Z" },
            { "point": { "lat": 41.5, "lon": -93.5 }, "eventTimestamp": "2024-07-01T12:00:00Z" }
        ]),
    );

    engine.sync_resource(ResourceKind::Equipment).await.unwrap();
    let report = engine.sync_resource(ResourceKind::LocationHistory).await.unwrap();
    assert_eq!(report.synced, 2);

    let eq = engine.db().equipment().get("eq-1").await.unwrap().unwrap();
    assert_eq!(eq.last_latitude, Some(41.5));
    assert_eq!(eq.last_longitude, Some(-93.5));
}

// =============================================================================
// Orchestrator
// =============================================================================

#[tokio::test]
async fn test_full_run_is_logged_even_with_step_errors() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values("/platform/organizations", json!([org("A")]));

    let report = engine.sync_all().await.unwrap();
    assert_eq!(report.results.len(), ResourceKind::CANONICAL.len());
    assert_eq!(report.results["organizations"].synced, 1);
    assert!(report.results["farms"].has_errors());

    let log = engine.db().sync_log().recent(10).await.unwrap();
    let full: Vec<_> = log.iter().filter(|e| e.sync_type == "full").collect();
    assert_eq!(full.len(), 2);
    assert!(full.iter().any(|e| e.status == SyncStatus::InProgress));
    let completed = full
        .iter()
        .find(|e| e.status == SyncStatus::Completed)
        .unwrap();
    assert_eq!(completed.records_synced, report.total_synced() as i64);
    assert!(completed.error_message.is_some());
}

#[tokio::test]
async fn test_parallel_waves_produce_the_same_results() {
    let mock = MockVendor::start().await;
    let mut config = mock.config();
    config.sync.parallel_branches = true;
    let engine = engine_with(config).await;
    connect(&engine).await;

    mock.values("/platform/organizations", json!([org("A")]));
    mock.values(
        "/platform/organizations/A/fields",
        json!([{ "id": "f1", "name": "North" }]),
    );

    let report = engine.sync_all().await.unwrap();
    assert_eq!(report.results.len(), ResourceKind::CANONICAL.len());
    assert_eq!(report.results["fields"].synced, 1);
}

#[tokio::test]
async fn test_no_credential_fails_before_logging() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;

    let err = engine.sync_all().await.unwrap_err();
    assert!(matches!(err, SyncError::NotAuthenticated));
    assert_eq!(engine.db().sync_log().recent(10).await.unwrap().len(), 0);
    assert_eq!(mock.hits("/platform/organizations"), 0);
}

#[tokio::test]
async fn test_concurrent_run_is_rejected() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.slow_json(
        "/platform/organizations",
        json!({ "values": [org("A")] }),
        Duration::from_millis(200),
    );

    let (first, second) = tokio::join!(
        engine.sync_resource(ResourceKind::Organizations),
        engine.sync_all()
    );
    assert_eq!(first.unwrap().synced, 1);
    assert!(matches!(second, Err(SyncError::SyncInProgress)));
}

#[tokio::test]
async fn test_closed_database_surfaces_as_database_error() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values("/platform/organizations", json!([org("A")]));
    engine.sync_resource(ResourceKind::Organizations).await.unwrap();
    engine.db().close().await;

    let err = engine.sync_resource(ResourceKind::Farms).await.unwrap_err();
    assert!(matches!(err, SyncError::Database(_)));
}

// =============================================================================
// Token lifecycle
// =============================================================================

#[tokio::test]
async fn test_expired_token_is_refreshed_before_sync() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    engine
        .db()
        .credentials()
        .replace_all(
            "stale",
            "refresh-1",
            Utc::now() - chrono::Duration::seconds(1),
            "ag1",
        )
        .await
        .unwrap();

    mock.json(
        "/oauth/token",
        json!({ "access_token": "fresh", "expires_in": 3600 }),
    );
    mock.values("/platform/organizations", json!([org("A")]));

    let report = engine.sync_resource(ResourceKind::Organizations).await.unwrap();
    assert_eq!(report.synced, 1);

    let forms = mock.token_forms();
    assert_eq!(forms.len(), 1);
    assert!(forms[0].contains("grant_type=refresh_token"));
    assert!(forms[0].contains("refresh_token=refresh-1"));

    let credential = engine.db().credentials().latest().await.unwrap().unwrap();
    assert_eq!(credential.access_token, "fresh");
    // Not rotated by the server
    assert_eq!(credential.refresh_token, "refresh-1");
    assert!(credential.expires_at > Utc::now());
}

#[tokio::test]
async fn test_rejected_refresh_reads_as_not_authenticated() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    engine
        .db()
        .credentials()
        .replace_all(
            "stale",
            "refresh-1",
            Utc::now() - chrono::Duration::seconds(1),
            "ag1",
        )
        .await
        .unwrap();
    mock.fail("/oauth/token", 400, "invalid_grant");

    let err = engine.sync_resource(ResourceKind::Organizations).await.unwrap_err();
    assert!(matches!(err, SyncError::NotAuthenticated));
}

#[tokio::test]
async fn test_code_exchange_replaces_credentials() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.json(
        "/oauth/token",
        json!({ "access_token": "new", "refresh_token": "r2", "expires_in": 600 }),
    );

    let credential = engine.auth().exchange_code("abc").await.unwrap();
    assert_eq!(credential.access_token, "new");
    assert!(credential.scopes.contains("offline_access"));
    assert_eq!(engine.db().credentials().count().await.unwrap(), 1);

    let forms = mock.token_forms();
    assert!(forms[0].contains("grant_type=authorization_code"));
    assert!(forms[0].contains("code=abc"));

    let status = engine.auth().status().await.unwrap();
    assert!(status.connected);
    assert_eq!(status.is_expired, Some(false));
}

#[tokio::test]
async fn test_out_of_range_token_lifetime_is_an_exchange_failure() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.json(
        "/oauth/token",
        json!({ "access_token": "x", "expires_in": i64::MAX }),
    );

    let err = engine.auth().exchange_code("abc").await.unwrap_err();
    assert!(matches!(err, SyncError::TokenExchangeFailed(_)));

    // The stored credential is left as it was.
    let stored = engine.db().credentials().latest().await.unwrap().unwrap();
    assert_eq!(stored.access_token, "access-1");
}

#[tokio::test]
async fn test_organization_access_flags_pending_connections() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.values(
        "/platform/organizations",
        json!([
            org("A"),
            { "id": "B", "name": "Org B", "links": [{ "rel": "connections", "uri": "https://connections.example/B" }] }
        ]),
    );

    let access = engine.organization_access().await.unwrap();
    assert_eq!(access.organizations.len(), 2);
    assert!(access.needs_connection);
}

#[tokio::test]
async fn test_proxy_returns_error_descriptor() {
    let mock = MockVendor::start().await;
    let engine = engine(&mock).await;
    connect(&engine).await;

    mock.fail("/platform/organizations/A/files", 403, "nope");
    let body = engine.proxy("/organizations/A/files").await.unwrap();
    assert_eq!(body, json!({ "error": true, "status": 403, "message": "nope" }));
}
