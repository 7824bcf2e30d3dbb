// crates/expense-core/tests/service_fallback.rs
// ============================================================================
// Module: Expense Service Fallback Tests
// Description: Demo-data fallback and status tracking in the expense service.
// Purpose: Ensure store failures degrade to demo data and are recorded.
// Dependencies: expense-core
// ============================================================================
//! ## Overview
//! Runs the service over a healthy in-memory store and over a store that is
//! always unreachable, then checks responses, status, and audit output.

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

use std::sync::Arc;
use std::sync::Mutex;

use expense_core::AuditEvent;
use expense_core::AuditSink;
use expense_core::CategoryId;
use expense_core::CreateExpenseRequest;
use expense_core::ExpenseDate;
use expense_core::ExpenseFilter;
use expense_core::ExpenseId;
use expense_core::ExpenseService;
use expense_core::ExpenseServiceError;
use expense_core::ExpenseStatusKind;
use expense_core::FixedClock;
use expense_core::InMemoryExpenseStore;
use expense_core::Money;
use expense_core::SharedExpenseStore;
use expense_core::UnavailableExpenseStore;
use expense_core::UserId;
use serde_json::Number;
use time::OffsetDateTime;
use time::macros::date;
use time::macros::datetime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const NOW: OffsetDateTime = datetime!(2026-03-10 12:00 UTC);

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl AuditSink for RecordingSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

fn service_with(store: SharedExpenseStore) -> (ExpenseService, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let service = ExpenseService::new(store, Arc::new(FixedClock::new(NOW)), sink.clone());
    (service, sink)
}

fn healthy() -> (ExpenseService, Arc<RecordingSink>) {
    service_with(SharedExpenseStore::from_store(InMemoryExpenseStore::seeded(NOW)))
}

fn unreachable() -> (ExpenseService, Arc<RecordingSink>) {
    service_with(SharedExpenseStore::from_store(UnavailableExpenseStore::new(
        "unable to open database file",
    )))
}

fn create_request(amount: &str) -> CreateExpenseRequest {
    CreateExpenseRequest {
        user_id: UserId::new(1),
        category_id: CategoryId::new(1),
        amount: serde_json::from_str::<Number>(amount).unwrap(),
        expense_date: ExpenseDate::new(date!(2026 - 03 - 09)),
        description: Some("  Train to Leeds  ".to_string()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn healthy_store_serves_live_data() {
    let (service, sink) = healthy();
    let id = service.create_expense(&create_request("42.5")).unwrap();
    let expense = service.expense_by_id(id).unwrap();
    assert_eq!(expense.amount, Money::from_minor(4250));
    assert_eq!(expense.description.as_deref(), Some("Train to Leeds"));
    assert!(service.submit_expense(id));
    assert_eq!(service.pending_expenses(None).len(), 2);
    assert!(!service.status().using_demo_data);
    assert!(sink.events.lock().unwrap().is_empty());
}

#[test]
fn unreachable_store_falls_back_to_demo_reads() {
    let (service, sink) = unreachable();
    let expenses = service.list_expenses(&ExpenseFilter::default());
    assert_eq!(expenses.len(), 4);
    assert_eq!(expenses[0].user_name, "Alice Example");

    let pending = service.pending_expenses(None);
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status(), Some(ExpenseStatusKind::Submitted));

    assert_eq!(service.categories().len(), 5);
    assert_eq!(service.statuses().len(), 4);
    assert_eq!(service.users().len(), 2);
    assert_eq!(service.managers().len(), 1);
    assert_eq!(service.recent_expenses(2).len(), 2);
    assert_eq!(service.dashboard_stats().approved_amount, Money::from_minor(13_725));
    assert_eq!(service.expense_by_id(ExpenseId::new(4)).unwrap().category_name, "Accommodation");
    assert!(service.user_by_id(UserId::new(9)).is_none());

    let status = service.status();
    assert!(status.using_demo_data);
    assert_eq!(status.last_error_operation.as_deref(), Some("usp_GetUserById"));
    assert_eq!(status.last_error_at, Some(NOW));
    assert!(status.last_error.unwrap().contains("unable to open database file"));

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), 10);
    assert!(events.iter().all(|event| event.event == "store_fallback"));
}

#[test]
fn unreachable_store_fails_writes() {
    let (service, _sink) = unreachable();
    assert!(!service.submit_expense(ExpenseId::new(3)));
    assert!(!service.approve_expense(ExpenseId::new(1), UserId::new(2)));
    assert!(!service.reject_expense(ExpenseId::new(1), UserId::new(2)));
    assert!(!service.delete_expense(ExpenseId::new(3)));
    let err = service.create_expense(&create_request("10")).unwrap_err();
    assert!(matches!(err, ExpenseServiceError::Unavailable(_)));
}

#[test]
fn demo_fallback_honors_filters() {
    let (service, _sink) = unreachable();
    let drafts = service.list_expenses(&ExpenseFilter {
        status_id: Some(ExpenseStatusKind::Draft.id()),
        ..ExpenseFilter::default()
    });
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].description.as_deref(), Some("Office stationery"));
}

#[test]
fn invalid_amounts_never_reach_the_store() {
    let (service, sink) = unreachable();
    let err = service.create_expense(&create_request("0")).unwrap_err();
    assert_eq!(err, ExpenseServiceError::Invalid("Amount must be greater than zero.".to_string()));
    let err = service.create_expense(&create_request("-3.5")).unwrap_err();
    assert!(matches!(err, ExpenseServiceError::Invalid(_)));
    let err = service.create_expense(&create_request("0.004")).unwrap_err();
    assert!(matches!(err, ExpenseServiceError::Invalid(_)));
    assert!(!service.status().using_demo_data);
    assert!(sink.events.lock().unwrap().is_empty());
}

#[test]
fn unknown_user_is_rejected() {
    let (service, _sink) = healthy();
    let mut request = create_request("12");
    request.user_id = UserId::new(404);
    let err = service.create_expense(&request).unwrap_err();
    assert!(matches!(err, ExpenseServiceError::Rejected(_)));
}

#[test]
fn overlong_descriptions_are_invalid() {
    let (service, _sink) = healthy();
    let mut request = create_request("12");
    request.description = Some("x".repeat(501));
    let err = service.create_expense(&request).unwrap_err();
    assert_eq!(
        err,
        ExpenseServiceError::Invalid("Description must be at most 500 characters.".to_string())
    );
}
