//! End-to-end audit pipeline tests over a scripted backend.
//!
//! These exercise the whole path: classification, discovery, pagination,
//! the two enrichment fan-outs, cross-reference resolution, and joining.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use lastmile_client::{FetchError, FetchOutcome, ResourceFetcher, Target};
use lastmile_core::{AuditError, Config};
use lastmile_recon::AuditPipeline;

const TASK: &str = "VT1234567890123";

/// Routes requests by URL shape to canned responses, recording every URL.
struct ScriptedBackend {
    calls: Mutex<Vec<String>>,
    route: fn(&str) -> FetchOutcome,
}

impl ScriptedBackend {
    fn new(route: fn(&str) -> FetchOutcome) -> Arc<Self> {
        Arc::new(Self { calls: Mutex::new(Vec::new()), route })
    }

    fn calls_matching(&self, needle: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| u.contains(needle)).count()
    }
}

#[async_trait]
impl ResourceFetcher for ScriptedBackend {
    async fn fetch_json(&self, target: &Target) -> FetchOutcome {
        self.calls.lock().unwrap().push(target.url.clone());
        (self.route)(&target.url)
    }
}

fn page(total: u64, list: Value) -> FetchOutcome {
    Ok(json!({ "data": { "total": total, "list": list } }))
}

/// One task, two defective targets: AT1 has 3 missing parcels, AT2 has a
/// missort page of 5 where only 2 are confirmed (status 7).
fn audit_route(url: &str) -> FetchOutcome {
    if url.contains("/audit/target/list") && url.contains("shipment_id=") {
        // Cross-reference lookup: every shipment is bound to AT1 and AT9.
        return page(2, json!([
            { "target_id": "AT1", "binding_entity": "ROUTE-1" },
            { "target_id": "AT9", "binding_entity": "ROUTE-9" },
        ]));
    }
    if url.contains("/audit/target/list") {
        return page(3, json!([
            { "target_id": "AT1", "missing_qty": 3, "missort_qty": 0 },
            { "target_id": "AT2", "missing_qty": 0, "missort_qty": 5 },
            { "target_id": "AT3", "missing_qty": 0, "missort_qty": 0 },
        ]));
    }
    if url.contains("result=5") {
        return page(3, json!([
            { "shipment_id": "BRM0000000000001" },
            { "shipment_id": "BRM0000000000002" },
            { "shipment_id": "BRM0000000000003" },
        ]));
    }
    if url.contains("parcel_scan_status=2") {
        return page(5, json!([
            { "shipment_id": "BRS1", "validation_status": 7 },
            { "shipment_id": "BRS2", "validation_status": 2 },
            { "shipment_id": "BRS3", "validation_status": 7 },
            { "shipment_id": "BRS4", "validation_status": 1 },
            { "shipment_id": "BRS5", "validation_status": 3 },
        ]));
    }
    if url.contains("assignment_task/detail") {
        return Ok(json!({ "data": {
            "assigned_time": 1_705_321_845,
            "driver_id": 42,
            "driver_name": "Ana",
        }}));
    }
    if url.contains("/audit/target/view") {
        return Ok(json!({ "data": {
            "binding_entity": "ROUTE-1",
            "validation_operator": "op01",
        }}));
    }
    Err(FetchError::Status { status: 404, message: "unscripted".into(), body: None })
}

#[tokio::test]
async fn full_audit_run_produces_joined_rows() {
    let backend = ScriptedBackend::new(audit_route);
    let mut pipeline = AuditPipeline::new(backend.clone(), Config::default());

    let report = pipeline.run(TASK).await.unwrap();

    assert_eq!(report.header[0], "DATA_HORA");
    assert_eq!(report.len(), 5); // 3 missing + 2 confirmed missort

    // Discovery order: AT1's missing parcels first, then AT2's missorts.
    let first = &report.rows[0];
    assert_eq!(first[0], "15/01/2024 12:30:45");
    assert_eq!(first[1], TASK);
    assert_eq!(first[2], "AT1");
    assert_eq!(first[3], "BRM0000000000001");
    assert_eq!(first[4], "ROUTE-1"); // observed binding, from target view
    assert_eq!(first[5], "ROUTE-9"); // corrected: first entry not matching AT1
    assert_eq!(first[6], "op01");
    assert_eq!(first[7], "42");
    assert_eq!(first[8], "Ana");
    assert_eq!(first[9], "missing");

    let missort = &report.rows[3];
    assert_eq!(missort[2], "AT2");
    assert_eq!(missort[3], "BRS1");
    assert_eq!(missort[9], "missort");
    assert_eq!(report.rows[4][3], "BRS3");

    // Only confirmed missorts survived the client-side status filter.
    assert!(!report.rows.iter().any(|r| r[3] == "BRS2" || r[3] == "BRS4" || r[3] == "BRS5"));

    // AT3 had no defects: never enriched.
    assert_eq!(backend.calls_matching("assignment_task_id=AT3"), 0);
    assert_eq!(backend.calls_matching("assignment_task_id=AT1"), 1);
    assert_eq!(backend.calls_matching("assignment_task_id=AT2"), 1);
}

#[tokio::test]
async fn cross_reference_lookups_are_deduplicated_per_shipment() {
    let backend = ScriptedBackend::new(audit_route);
    let mut pipeline = AuditPipeline::new(backend.clone(), Config::default());

    pipeline.run(TASK).await.unwrap();

    // 5 rows, 5 distinct shipments -> 5 lookups, each issued once.
    assert_eq!(backend.calls_matching("shipment_id=BR"), 5);
}

#[tokio::test]
async fn classification_dedups_uppercases_and_caps_at_two_tasks() {
    fn empty_route(url: &str) -> FetchOutcome {
        if url.contains("/audit/target/list") {
            return page(0, json!([]));
        }
        Err(FetchError::Status { status: 404, message: "unscripted".into(), body: None })
    }

    let backend = ScriptedBackend::new(empty_route);
    let mut pipeline = AuditPipeline::new(backend.clone(), Config::default());

    let raw = "VTAAAAAAAAAAAAA vtaaaaaaaaaaaaa VTBBBBBBBBBBBBB VTCCCCCCCCCCCCC";
    let report = pipeline.run(raw).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(backend.calls_matching("task_id=VTAAAAAAAAAAAAA"), 1);
    assert_eq!(backend.calls_matching("task_id=VTBBBBBBBBBBBBB"), 1);
    // Third task is beyond the cap.
    assert_eq!(backend.calls_matching("task_id=VTCCCCCCCCCCCCC"), 0);
}

#[tokio::test]
async fn no_valid_tasks_aborts_before_any_network_call() {
    let backend = ScriptedBackend::new(audit_route);
    let mut pipeline = AuditPipeline::new(backend.clone(), Config::default());

    let err = pipeline.run("BR1234567890123 TO55 garbage").await;
    assert!(matches!(err, Err(AuditError::NoValidTasks)));
    assert_eq!(backend.calls.lock().unwrap().len(), 0);
}

#[tokio::test]
async fn discovery_failure_aborts_the_run() {
    fn failing_route(_url: &str) -> FetchOutcome {
        Err(FetchError::Status { status: 500, message: "backend down".into(), body: None })
    }

    let backend = ScriptedBackend::new(failing_route);
    let mut pipeline = AuditPipeline::new(backend, Config::default());

    let err = pipeline.run(TASK).await;
    match err {
        Err(AuditError::Discovery { task, reason }) => {
            assert_eq!(task, TASK);
            assert!(reason.contains("backend down"));
        }
        other => panic!("expected discovery error, got {other:?}"),
    }
}

#[tokio::test]
async fn failed_enrichment_degrades_fields_but_keeps_rows() {
    fn no_enrichment_route(url: &str) -> FetchOutcome {
        if url.contains("assignment_task/detail") || url.contains("/audit/target/view") {
            return Err(FetchError::Status { status: 502, message: "bad gateway".into(), body: None });
        }
        if url.contains("shipment_id=") && url.contains("/audit/target/list") {
            // Cross-reference also unavailable.
            return Err(FetchError::Decode { raw: "<html>".into() });
        }
        audit_route(url)
    }

    let backend = ScriptedBackend::new(no_enrichment_route);
    let mut pipeline = AuditPipeline::new(backend, Config::default());

    let report = pipeline.run(TASK).await.unwrap();
    assert_eq!(report.len(), 5);
    let row = &report.rows[0];
    // Enrichment-derived fields are empty; identity fields survive.
    assert_eq!(row[0], "");
    assert_eq!(row[2], "AT1");
    assert_eq!(row[3], "BRM0000000000001");
    assert_eq!(row[4], "");
    assert_eq!(row[5], "");
    assert_eq!(row[7], "");
    assert_eq!(row[9], "missing");
}
