// crates/expense-server/tests/http_api.rs
// ============================================================================
// Module: HTTP API Tests
// Description: End-to-end tests for the expense API over a real listener.
// Purpose: Verify routing, status codes, body limits, fallback, and audit.
// Dependencies: expense-server, reqwest, tokio
// ============================================================================

//! ## Overview
//! Each test binds an ephemeral loopback port, serves a server assembled from
//! injected parts, and drives it with an HTTP client.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use expense_config::ExpenseTrackerConfig;
use expense_core::AuditDetail;
use expense_core::AuditEvent;
use expense_core::AuditSink;
use expense_core::FixedClock;
use expense_core::InMemoryExpenseStore;
use expense_core::SharedExpenseStore;
use expense_core::UnavailableExpenseStore;
use expense_server::ExpenseServer;
use expense_server::HTTP_LATENCY_BUCKETS_MS;
use expense_server::NoopMetrics;
use expense_server::ServerParts;
use reqwest::Client;
use reqwest::StatusCode;
use serde_json::Value;
use serde_json::json;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::net::TcpListener;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Fixed clock instant for every test.
const NOW: OffsetDateTime = datetime!(2026-03-10 12:00 UTC);

/// Audit sink that keeps events in memory.
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditSink for RecordingSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

struct Harness {
    base: String,
    client: Client,
    audit: Arc<RecordingSink>,
}

impl Harness {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get_json(&self, path: &str) -> Value {
        let response = self.client.get(self.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "GET {path}");
        response.json().await.unwrap()
    }

    async fn post(&self, path: &str) -> StatusCode {
        self.client.post(self.url(path)).send().await.unwrap().status()
    }
}

async fn start(store: SharedExpenseStore, config: ExpenseTrackerConfig) -> Harness {
    let audit = Arc::new(RecordingSink::default());
    let server = ExpenseServer::from_parts(
        config,
        ServerParts {
            store,
            clock: Arc::new(FixedClock::new(NOW)),
            audit: Arc::clone(&audit) as Arc<dyn AuditSink>,
            metrics: Arc::new(NoopMetrics),
            chat_model: None,
        },
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(server.serve_listener(listener));
    Harness {
        base: format!("http://{addr}"),
        client: Client::new(),
        audit,
    }
}

async fn start_seeded() -> Harness {
    start(
        SharedExpenseStore::from_store(InMemoryExpenseStore::seeded(NOW)),
        ExpenseTrackerConfig::default(),
    )
    .await
}

fn ids(list: &Value) -> Vec<i64> {
    list.as_array().unwrap().iter().map(|e| e["expenseId"].as_i64().unwrap()).collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn list_and_lookup_expenses() {
    let h = start_seeded().await;
    let all = h.get_json("/api/expenses").await;
    assert_eq!(ids(&all), vec![3, 1, 2, 4]);
    assert_eq!(all[0]["amountGBP"], json!(7.99));
    assert_eq!(all[0]["currency"], "GBP");

    let approved = h.get_json("/api/expenses?statusId=3").await;
    assert_eq!(ids(&approved), vec![2, 4]);
    let searched = h.get_json("/api/expenses?searchTerm=taxi").await;
    assert_eq!(ids(&searched), vec![1]);

    let one = h.get_json("/api/expenses/2").await;
    assert_eq!(one["categoryName"], "Meals");
    let missing = h.client.get(h.url("/api/expenses/99")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], "expense not found");
}

#[tokio::test(flavor = "multi_thread")]
async fn create_returns_location_and_rejects_bad_input() {
    let h = start_seeded().await;
    let response = h
        .client
        .post(h.url("/api/expenses"))
        .json(&json!({
            "userId": 1,
            "categoryId": 2,
            "amount": 12.5,
            "expenseDate": "2026-03-09",
            "description": "Team coffee"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()["location"], "/api/expenses/5");
    let id: Value = response.json().await.unwrap();
    assert_eq!(id, json!(5));
    let created = h.get_json("/api/expenses/5").await;
    assert_eq!(created["amountMinor"], 1250);
    assert_eq!(created["statusName"], "Draft");

    let zero = h
        .client
        .post(h.url("/api/expenses"))
        .json(&json!({"userId": 1, "categoryId": 2, "amount": 0, "expenseDate": "2026-03-09"}))
        .send()
        .await
        .unwrap();
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);
    let body: Value = zero.json().await.unwrap();
    assert_eq!(body["error"], "Amount must be greater than zero.");

    let unknown = h
        .client
        .post(h.url("/api/expenses"))
        .json(&json!({"userId": 1, "categoryId": 42, "amount": 3, "expenseDate": "2026-03-09"}))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let garbage = h
        .client
        .post(h.url("/api/expenses"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(garbage.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn lifecycle_transitions_map_to_no_content_or_not_found() {
    let h = start_seeded().await;
    let update = h
        .client
        .put(h.url("/api/expenses/3"))
        .json(&json!({"categoryId": 3, "amount": 9.99, "expenseDate": "2026-03-09"}))
        .send()
        .await
        .unwrap();
    assert_eq!(update.status(), StatusCode::NO_CONTENT);
    let not_draft = h
        .client
        .put(h.url("/api/expenses/1"))
        .json(&json!({"categoryId": 1, "amount": 1, "expenseDate": "2026-03-09"}))
        .send()
        .await
        .unwrap();
    assert_eq!(not_draft.status(), StatusCode::NOT_FOUND);

    assert_eq!(h.post("/api/expenses/3/submit").await, StatusCode::NO_CONTENT);
    assert_eq!(h.post("/api/expenses/3/submit").await, StatusCode::NOT_FOUND);
    assert_eq!(h.post("/api/expenses/3/approve").await, StatusCode::NO_CONTENT);
    let approved = h.get_json("/api/expenses/3").await;
    assert_eq!(approved["statusName"], "Approved");
    assert_eq!(approved["reviewedBy"], 2);

    assert_eq!(h.post("/api/expenses/1/reject?reviewerId=1").await, StatusCode::NOT_FOUND);
    assert_eq!(h.post("/api/expenses/1/reject?reviewerId=2").await, StatusCode::NO_CONTENT);

    let delete = h.client.delete(h.url("/api/expenses/2")).send().await.unwrap();
    assert_eq!(delete.status(), StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn pending_recent_and_reference_data() {
    let h = start_seeded().await;
    assert_eq!(ids(&h.get_json("/api/expenses/pending").await), vec![1]);
    let hotel = h.get_json("/api/expenses/pending?searchTerm=hotel").await;
    assert!(ids(&hotel).is_empty());
    assert_eq!(ids(&h.get_json("/api/expenses/recent?count=2").await), vec![3, 1]);
    assert_eq!(ids(&h.get_json("/api/expenses/recent").await).len(), 4);

    assert_eq!(h.get_json("/api/categories").await.as_array().unwrap().len(), 5);
    let statuses = h.get_json("/api/statuses").await;
    assert_eq!(statuses[1]["statusName"], "Submitted");
    assert_eq!(h.get_json("/api/users").await.as_array().unwrap().len(), 2);
    let managers = h.get_json("/api/users/managers").await;
    assert_eq!(managers[0]["userName"], "Bob Manager");
    assert_eq!(h.get_json("/api/users/1").await["managerName"], "Bob Manager");
    let missing = h.client.get(h.url("/api/users/7")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let stats = h.get_json("/api/dashboard/stats").await;
    assert_eq!(stats["totalExpenses"], 4);
    assert_eq!(stats["pendingApprovals"], 1);
    assert_eq!(stats["approvedAmountMinor"], 13725);
    assert_eq!(stats["approvedCount"], 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn unavailable_store_serves_demo_data_and_reports_status() {
    let h = start(
        SharedExpenseStore::from_store(UnavailableExpenseStore::new("connection refused")),
        ExpenseTrackerConfig::default(),
    )
    .await;
    let before = h.get_json("/api/status").await;
    assert_eq!(before["usingDemoData"], false);

    let all = h.get_json("/api/expenses").await;
    assert_eq!(all.as_array().unwrap().len(), 4);
    let after = h.get_json("/api/status").await;
    assert_eq!(after["usingDemoData"], true);
    assert_eq!(after["lastErrorOperation"], "usp_GetExpenses");

    let create = h
        .client
        .post(h.url("/api/expenses"))
        .json(&json!({"userId": 1, "categoryId": 1, "amount": 5, "expenseDate": "2026-03-09"}))
        .send()
        .await
        .unwrap();
    assert_eq!(create.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(h.post("/api/expenses/1/submit").await, StatusCode::NOT_FOUND);
}

#[tokio::test(flavor = "multi_thread")]
async fn oversized_bodies_are_rejected() {
    let mut config = ExpenseTrackerConfig::default();
    config.server.max_body_bytes = 64;
    let h = start(SharedExpenseStore::from_store(InMemoryExpenseStore::seeded(NOW)), config).await;
    let response = h
        .client
        .post(h.url("/api/chat"))
        .json(&json!({"message": "x".repeat(200)}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "request body exceeds 64 bytes");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_path_and_query_parameters_return_json_errors() {
    let h = start_seeded().await;
    for path in [
        "/api/expenses/abc",
        "/api/expenses?statusId=x",
        "/api/expenses/recent?count=lots",
        "/api/users/abc",
    ] {
        let response = h.client.get(h.url(path)).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "GET {path}");
        let body: Value = response.json().await.unwrap();
        assert!(body["error"].as_str().is_some_and(|text| !text.is_empty()), "GET {path}");
    }
    let response =
        h.client.post(h.url("/api/expenses/1/approve?reviewerId=boss")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test(flavor = "multi_thread")]
async fn chat_without_model_returns_demo_reply() {
    let h = start_seeded().await;
    let status = h.get_json("/api/chat/status").await;
    assert_eq!(status, json!({"enabled": false}));

    let response = h
        .client
        .post(h.url("/api/chat"))
        .json(&json!({"message": "Show me all expenses", "history": []}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let reply: Value = response.json().await.unwrap();
    assert_eq!(reply["success"], true);
    assert!(reply["message"].as_str().unwrap().starts_with("**Sample Expenses**"));

    let empty = h.client.post(h.url("/api/chat")).json(&json!({"message": "  "})).send().await;
    assert_eq!(empty.unwrap().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test(flavor = "multi_thread")]
async fn requests_are_audited_by_route_template() {
    let h = start_seeded().await;
    h.get_json("/api/expenses/2").await;
    let missing = h.client.get(h.url("/nope")).send().await.unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let events = h.audit.events.lock().unwrap().clone();
    let requests: Vec<(String, u16, &str, Option<u64>)> = events
        .iter()
        .filter_map(|event| match &event.detail {
            AuditDetail::HttpRequest {
                path,
                status,
                outcome,
                latency_bucket_ms,
                ..
            } => Some((path.clone(), *status, *outcome, *latency_bucket_ms)),
            _ => None,
        })
        .collect();
    let found = requests.iter().find(|request| request.0 == "/api/expenses/{id}").unwrap();
    assert_eq!((found.1, found.2), (200, "ok"));
    assert!(found.3.is_some_and(|bound| HTTP_LATENCY_BUCKETS_MS.contains(&bound)));
    let unmatched = requests.iter().find(|request| request.0 == "unmatched").unwrap();
    assert_eq!((unmatched.1, unmatched.2), (404, "client_error"));
}
