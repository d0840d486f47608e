#![cfg(feature = "http_api")]

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
};
use rams_workload::{
    Activity, Project, Resource, SqlitePlanningStore, WorkCalendar, WorkPackage, http_api,
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

fn new_router() -> axum::Router {
    let store = SqlitePlanningStore::in_memory().unwrap();
    let state = http_api::AppState::new(store, WorkCalendar::default());
    http_api::router(state)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn send_json(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Ana (40h) with one 90h activity from mid-January to mid-March 2024.
async fn seed(app: &axum::Router) -> (Resource, WorkPackage, Activity) {
    let (status, body) = send_json(
        app,
        "POST",
        "/resources",
        Some(json!({ "name": "Ana", "contract_hours": 40.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let resource: Resource = serde_json::from_value(body).unwrap();

    let (_, body) = send_json(
        app,
        "POST",
        "/projects",
        Some(json!({ "name": "Metro", "start_date": "2024-01-01", "end_date": "2024-12-31" })),
    )
    .await;
    let project: Project = serde_json::from_value(body).unwrap();

    let (status, body) = send_json(
        app,
        "POST",
        "/work_packages",
        Some(json!({
            "project_id": project.id,
            "name": "Braking FMECA",
            "rams_tag": "FMECA",
            "standard_effort_hours": 80.0
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let work_package: WorkPackage = serde_json::from_value(body).unwrap();

    let (status, body) = send_json(
        app,
        "POST",
        "/activities",
        Some(json!({
            "work_package_id": work_package.id,
            "resource_id": resource.id,
            "planned_hours": 90.0,
            "start_date": "2024-01-15",
            "end_date": "2024-03-10"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let activity: Activity = serde_json::from_value(body).unwrap();
    (resource, work_package, activity)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = new_router();
    let (status, body) = send_json(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn resource_lifecycle_via_http_api() {
    let app = new_router();
    let (resource, _, _) = seed(&app).await;
    let uri = format!("/resources/{}", resource.id);

    let (status, body) = send_json(
        &app,
        "PUT",
        &uri,
        Some(json!({
            "name": "Ana Maria",
            "contract_hours": 35.0,
            "monthly_availability_overrides": { "2024-02": { "available_days": 0 } }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ana Maria");

    let (status, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["monthly_availability_overrides"]["2024-02"]["available_days"],
        0
    );

    let (status, _) = send_json(&app, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    // Cascade removed the activity as well.
    let (_, body) = send_json(&app, "GET", "/activities", None).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn invalid_payload_returns_bad_request() {
    let app = new_router();
    let (status, body) = send_json(
        &app,
        "POST",
        "/resources",
        Some(json!({ "name": "", "contract_hours": 40.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");

    let (status, body) = send_json(
        &app,
        "POST",
        "/activities",
        Some(json!({
            "work_package_id": 42,
            "resource_id": 42,
            "planned_hours": 1.0,
            "start_date": "2024-01-01",
            "end_date": "2024-01-01"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("work package 42"));
}

#[tokio::test]
async fn capacity_requires_year_and_month() {
    let app = new_router();
    for uri in ["/capacity", "/capacity?year=2024", "/capacity?year=2024&month=13", "/capacity?year=abc&month=1"] {
        let (status, body) = send_json(&app, "GET", uri, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"], "invalid_request");
    }
}

#[tokio::test]
async fn capacity_overview_counts_activities_by_start_month() {
    let app = new_router();
    let (resource, _, _) = seed(&app).await;

    let (status, body) = send_json(&app, "GET", "/capacity?year=2024&month=1", None).await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["monthly_capacity"], 184.0);
    assert_eq!(data[0]["total_planned_hours"], 90.0);
    assert_eq!(data[0]["capacity_status"], "MODERATE_UTILIZATION");
    assert_eq!(body["warnings"].as_array().unwrap().len(), 0);

    let uri = format!("/resources/{}/capacity?year=2024&month=2", resource.id);
    let (status, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_planned_hours"], 0.0);
    assert_eq!(body["working_days"], 21);

    let (status, _) = send_json(&app, "GET", "/resources/999/capacity?year=2024&month=2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn over_capacity_produces_warning() {
    let app = new_router();
    let (resource, work_package, _) = seed(&app).await;
    let (status, _) = send_json(
        &app,
        "POST",
        "/activities",
        Some(json!({
            "work_package_id": work_package.id,
            "resource_id": resource.id,
            "planned_hours": 100.0,
            "start_date": "2024-01-02",
            "end_date": "2024-01-31"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, body) = send_json(&app, "GET", "/capacity?year=2024&month=1", None).await;
    let warnings = body["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0]["type"], "OVER_CAPACITY");
    assert_eq!(warnings[0]["message"], "Ana is over capacity by 6 hours in 2024-01");
    assert_eq!(body["summary"]["over_capacity"], 1);
}

#[tokio::test]
async fn workload_spreads_hours_over_months() {
    let app = new_router();
    let (resource, _, _) = seed(&app).await;

    let (status, body) = send_json(&app, "GET", "/workload?year=2024", None).await;
    assert_eq!(status, StatusCode::OK);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    assert!(data.iter().all(|b| b["total_hours"] == 30.0));
    assert_eq!(body["totals"]["grand_total"], 90.0);

    let (_, body) = send_json(&app, "GET", "/workload?year=2023", None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let uri = format!("/workload?year=2024&resource_id={}", resource.id + 1);
    let (_, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let (status, _) = send_json(&app, "GET", "/workload", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send_json(&app, "GET", "/workload?year=2024&policy=sideways", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn budget_endpoints_report_status() {
    let app = new_router();
    let (_, work_package, _) = seed(&app).await;

    let (status, body) = send_json(&app, "GET", "/budget", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["budget_status"], "OVER_BUDGET");
    assert_eq!(body[0]["hours_remaining"], -10.0);

    let uri = format!("/budget/{}", work_package.id);
    let (status, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["work_package_name"], "Braking FMECA");

    let (status, _) = send_json(&app, "GET", "/budget/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send_json(&app, "GET", "/rams_distribution", None).await;
    assert_eq!(body[0]["rams_tag"], "FMECA");
    assert_eq!(body[0]["resource_count"], 1);
}

#[tokio::test]
async fn change_log_lists_latest_first() {
    let app = new_router();
    let (resource, _, _) = seed(&app).await;

    let (status, body) = send_json(&app, "GET", "/change_logs?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = body.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["entity_type"], "activity");
    assert_eq!(entries[0]["action"], "CREATE");

    let uri = format!("/change_logs?entity_type=resource&entity_id={}", resource.id);
    let (_, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = send_json(&app, "GET", "/change_logs?entity_type=resource", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn calendar_update_changes_capacity() {
    let app = new_router();
    seed(&app).await;

    let (status, body) = send_json(
        &app,
        "PUT",
        "/calendar",
        Some(json!({
            "working_days": ["Mon", "Tue", "Wed", "Thu", "Fri"],
            "holidays": ["2024-01-01"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["holidays"][0], "2024-01-01");

    let (_, body) = send_json(&app, "GET", "/capacity?year=2024&month=1", None).await;
    assert_eq!(body["data"][0]["working_days"], 22);

    let (status, _) = send_json(
        &app,
        "PUT",
        "/calendar",
        Some(json!({ "working_days": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn csv_reports_are_downloadable() {
    let app = new_router();
    seed(&app).await;

    let (status, bytes) = send(&app, "GET", "/reports/workload.csv?year=2024", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(bytes).unwrap();
    assert!(text.starts_with("Resource,Project,Month,Total Hours,Work Packages"));
    assert!(text.contains("Ana,Metro,February,30.00,Braking FMECA"));

    let (status, bytes) = send(&app, "GET", "/reports/capacity.csv?year=2024&month=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(String::from_utf8(bytes).unwrap().contains("Ana,40.0,23,184.0,90.0"));

    let (status, _) = send(&app, "GET", "/reports/capacity.csv", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/reports/budget.csv", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/reports/rams.csv", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn snapshot_export_and_import() {
    let source = new_router();
    seed(&source).await;
    let (status, snapshot) = send_json(&source, "GET", "/snapshot", None).await;
    assert_eq!(status, StatusCode::OK);

    let target = new_router();
    let (status, _) = send_json(&target, "PUT", "/snapshot", Some(snapshot.clone())).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, copied) = send_json(&target, "GET", "/snapshot", None).await;
    assert_eq!(copied, snapshot);
}

#[tokio::test]
async fn malformed_json_body_returns_bad_request() {
    let app = new_router();
    let request = Request::builder()
        .method("POST")
        .uri("/resources")
        .header("content-type", "application/json")
        .body(Body::from("{\"name\": \"Ana\""))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "invalid_request");

    // Well-formed JSON with a missing field is rejected the same way.
    let (status, body) = send_json(&app, "POST", "/projects", Some(json!({ "name": "Metro" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_request");
}

#[tokio::test]
async fn decimal_hours_hit_budget_and_capacity_exactly() {
    let app = new_router();
    // 1.5h per week with one available day in February is 0.3h of capacity.
    let (_, body) = send_json(
        &app,
        "POST",
        "/resources",
        Some(json!({
            "name": "Ana",
            "contract_hours": 1.5,
            "monthly_availability_overrides": { "2024-02": { "available_days": 1 } }
        })),
    )
    .await;
    let resource: Resource = serde_json::from_value(body).unwrap();
    let (_, body) = send_json(
        &app,
        "POST",
        "/projects",
        Some(json!({ "name": "Metro", "start_date": "2024-01-01", "end_date": "2024-12-31" })),
    )
    .await;
    let project: Project = serde_json::from_value(body).unwrap();
    let (_, body) = send_json(
        &app,
        "POST",
        "/work_packages",
        Some(json!({
            "project_id": project.id,
            "name": "Hazard Log",
            "rams_tag": "Hazard Log",
            "standard_effort_hours": 0.3
        })),
    )
    .await;
    let work_package: WorkPackage = serde_json::from_value(body).unwrap();
    for hours in [0.1, 0.2] {
        let (status, _) = send_json(
            &app,
            "POST",
            "/activities",
            Some(json!({
                "work_package_id": work_package.id,
                "resource_id": resource.id,
                "planned_hours": hours,
                "start_date": "2024-02-05",
                "end_date": "2024-02-05"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let uri = format!("/budget/{}", work_package.id);
    let (_, body) = send_json(&app, "GET", &uri, None).await;
    assert_eq!(body["budget_status"], "AT_BUDGET");
    assert_eq!(body["total_planned_hours"], 0.3);
    assert_eq!(body["hours_remaining"], 0.0);

    let (_, body) = send_json(&app, "GET", "/capacity?year=2024&month=2", None).await;
    let ana = &body["data"][0];
    assert_eq!(ana["monthly_capacity"], 0.3);
    assert_eq!(ana["total_planned_hours"], 0.3);
    assert_eq!(ana["is_over_capacity"], false);
    assert_eq!(ana["capacity_status"], "AT_CAPACITY");
    assert_eq!(body["summary"]["over_capacity"], 0);
    assert!(
        body["warnings"]
            .as_array()
            .unwrap()
            .iter()
            .all(|w| w["type"] != "OVER_CAPACITY")
    );
}
