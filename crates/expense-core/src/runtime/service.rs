// crates/expense-core/src/runtime/service.rs
// ============================================================================
// Module: Expense Service
// Description: Fallback-aware facade over the expense procedure contract.
// Purpose: Call the backend, remember failures, and serve demo data instead.
// Dependencies: crate::{audit, core, interfaces, runtime}, serde, time
// ============================================================================

//! ## Overview
//! [`ExpenseService`] is the only caller of an [`ExpenseStore`]. Every
//! operation invokes exactly one procedure. A successful call clears demo
//! mode; a failed call records the error in [`DataSourceStatus`], emits a
//! `store_fallback` audit event, and answers from the demo data set. Writes
//! never pretend to succeed while the backend is down.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::core::CreateExpenseRequest;
use crate::core::DashboardStats;
use crate::core::Expense;
use crate::core::ExpenseCategory;
use crate::core::ExpenseFilter;
use crate::core::ExpenseId;
use crate::core::ExpenseStatus;
use crate::core::ExpenseStatusKind;
use crate::core::RoleKind;
use crate::core::UpdateExpenseRequest;
use crate::core::User;
use crate::core::UserId;
use crate::core::matches_search;
use crate::interfaces::ExpenseStore;
use crate::interfaces::Procedure;
use crate::interfaces::StoreError;
use crate::runtime::clock::Clock;
use crate::runtime::demo;
use crate::runtime::store::SharedExpenseStore;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Snapshot of where the service is reading data from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceStatus {
    /// True while responses come from demo data.
    pub using_demo_data: bool,
    /// Message of the most recent store failure.
    pub last_error: Option<String>,
    /// Procedure that failed most recently.
    pub last_error_operation: Option<String>,
    /// Time of the most recent store failure.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_error_at: Option<OffsetDateTime>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Expense service errors for write paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExpenseServiceError {
    /// Request failed validation before reaching the store.
    #[error("{0}")]
    Invalid(String),
    /// Store refused the request.
    #[error("{0}")]
    Rejected(String),
    /// Store is unreachable.
    #[error("expense store unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Fallback-aware expense service.
pub struct ExpenseService {
    /// Backend implementing the procedures.
    store: SharedExpenseStore,
    /// Time source for stamps and demo data.
    clock: Arc<dyn Clock>,
    /// Audit sink for fallback events.
    audit: Arc<dyn AuditSink>,
    /// Current data source status.
    status: Mutex<DataSourceStatus>,
}

impl ExpenseService {
    /// Creates a service over `store`.
    #[must_use]
    pub fn new(
        store: SharedExpenseStore,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            store,
            clock,
            audit,
            status: Mutex::new(DataSourceStatus::default()),
        }
    }

    /// Returns the current data source status.
    #[must_use]
    pub fn status(&self) -> DataSourceStatus {
        self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the service clock's current time.
    #[must_use]
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    /// Lists expenses matching `filter`.
    #[must_use]
    pub fn list_expenses(&self, filter: &ExpenseFilter) -> Vec<Expense> {
        self.call(Procedure::GetExpenses, |store| store.list_expenses(filter)).unwrap_or_else(|_| {
            demo::demo_expenses(self.now())
                .into_iter()
                .filter(|expense| filter.matches(expense))
                .collect()
        })
    }

    /// Loads one expense.
    #[must_use]
    pub fn expense_by_id(&self, id: ExpenseId) -> Option<Expense> {
        self.call(Procedure::GetExpenseById, |store| store.expense_by_id(id)).unwrap_or_else(|_| {
            demo::demo_expenses(self.now()).into_iter().find(|expense| expense.expense_id == id)
        })
    }

    /// Creates a draft expense.
    ///
    /// # Errors
    ///
    /// Returns [`ExpenseServiceError::Invalid`] for bad input,
    /// [`ExpenseServiceError::Rejected`] when the user or category is unknown
    /// or inactive, and [`ExpenseServiceError::Unavailable`] when the store
    /// cannot be reached.
    pub fn create_expense(
        &self,
        request: &CreateExpenseRequest,
    ) -> Result<ExpenseId, ExpenseServiceError> {
        let expense =
            request.validate().map_err(|err| ExpenseServiceError::Invalid(err.to_string()))?;
        let now = self.now();
        match self.call(Procedure::CreateExpense, |store| store.create_expense(&expense, now)) {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(ExpenseServiceError::Rejected(
                "User or category is unknown or inactive.".to_string(),
            )),
            Err(err) => Err(ExpenseServiceError::Unavailable(err.to_string())),
        }
    }

    /// Edits a draft expense, returning whether it changed.
    ///
    /// # Errors
    ///
    /// Returns [`ExpenseServiceError::Invalid`] for bad input.
    pub fn update_expense(
        &self,
        id: ExpenseId,
        request: &UpdateExpenseRequest,
    ) -> Result<bool, ExpenseServiceError> {
        let update =
            request.validate().map_err(|err| ExpenseServiceError::Invalid(err.to_string()))?;
        Ok(self
            .call(Procedure::UpdateExpense, |store| store.update_expense(id, &update))
            .unwrap_or(false))
    }

    /// Deletes a draft expense.
    #[must_use]
    pub fn delete_expense(&self, id: ExpenseId) -> bool {
        self.call(Procedure::DeleteExpense, |store| store.delete_expense(id)).unwrap_or(false)
    }

    /// Submits a draft expense for review.
    #[must_use]
    pub fn submit_expense(&self, id: ExpenseId) -> bool {
        let now = self.now();
        self.call(Procedure::SubmitExpense, |store| store.submit_expense(id, now)).unwrap_or(false)
    }

    /// Approves a submitted expense.
    #[must_use]
    pub fn approve_expense(&self, id: ExpenseId, reviewer: UserId) -> bool {
        let now = self.now();
        self.call(Procedure::ApproveExpense, |store| store.approve_expense(id, reviewer, now))
            .unwrap_or(false)
    }

    /// Rejects a submitted expense.
    #[must_use]
    pub fn reject_expense(&self, id: ExpenseId, reviewer: UserId) -> bool {
        let now = self.now();
        self.call(Procedure::RejectExpense, |store| store.reject_expense(id, reviewer, now))
            .unwrap_or(false)
    }

    /// Lists submitted expenses awaiting review.
    #[must_use]
    pub fn pending_expenses(&self, search_term: Option<&str>) -> Vec<Expense> {
        self.call(Procedure::GetPendingExpenses, |store| store.pending_expenses(search_term))
            .unwrap_or_else(|_| {
                demo::demo_expenses(self.now())
                    .into_iter()
                    .filter(|expense| expense.status() == Some(ExpenseStatusKind::Submitted))
                    .filter(|expense| matches_search(search_term, expense))
                    .collect()
            })
    }

    /// Lists expense categories.
    #[must_use]
    pub fn categories(&self) -> Vec<ExpenseCategory> {
        self.call(Procedure::GetCategories, |store| store.categories())
            .unwrap_or_else(|_| demo::demo_categories())
    }

    /// Lists expense statuses.
    #[must_use]
    pub fn statuses(&self) -> Vec<ExpenseStatus> {
        self.call(Procedure::GetStatuses, |store| store.statuses())
            .unwrap_or_else(|_| demo::demo_statuses())
    }

    /// Lists users.
    #[must_use]
    pub fn users(&self) -> Vec<User> {
        self.call(Procedure::GetUsers, |store| store.users())
            .unwrap_or_else(|_| demo::demo_users(self.now()))
    }

    /// Loads one user.
    #[must_use]
    pub fn user_by_id(&self, id: UserId) -> Option<User> {
        self.call(Procedure::GetUserById, |store| store.user_by_id(id)).unwrap_or_else(|_| {
            demo::demo_users(self.now()).into_iter().find(|user| user.user_id == id)
        })
    }

    /// Lists managers.
    #[must_use]
    pub fn managers(&self) -> Vec<User> {
        self.call(Procedure::GetManagers, |store| store.managers()).unwrap_or_else(|_| {
            demo::demo_users(self.now())
                .into_iter()
                .filter(|user| user.role_id == RoleKind::Manager.id())
                .collect()
        })
    }

    /// Computes dashboard aggregates.
    #[must_use]
    pub fn dashboard_stats(&self) -> DashboardStats {
        self.call(Procedure::GetDashboardStats, |store| store.dashboard_stats())
            .unwrap_or_else(|_| demo::demo_stats())
    }

    /// Lists the `top` most recently created expenses.
    #[must_use]
    pub fn recent_expenses(&self, top: usize) -> Vec<Expense> {
        self.call(Procedure::GetRecentExpenses, |store| store.recent_expenses(top))
            .unwrap_or_else(|_| demo::demo_expenses(self.now()).into_iter().take(top).collect())
    }

    /// Invokes one procedure and updates the data source status.
    fn call<T>(
        &self,
        procedure: Procedure,
        op: impl FnOnce(&SharedExpenseStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        match op(&self.store) {
            Ok(value) => {
                self.status.lock().unwrap_or_else(PoisonError::into_inner).using_demo_data = false;
                Ok(value)
            }
            Err(err) => {
                self.record_failure(procedure, &err);
                Err(err)
            }
        }
    }

    /// Switches to demo mode and records the failure.
    fn record_failure(&self, procedure: Procedure, err: &StoreError) {
        let message = err.to_string();
        {
            let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
            status.using_demo_data = true;
            status.last_error = Some(message.clone());
            status.last_error_operation = Some(procedure.name().to_string());
            status.last_error_at = Some(self.now());
        }
        self.audit.record(&AuditEvent::store_fallback(procedure.name(), &message));
    }
}
