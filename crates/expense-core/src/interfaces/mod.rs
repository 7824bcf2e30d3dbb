// crates/expense-core/src/interfaces/mod.rs
// ============================================================================
// Module: Expense Procedure Contract
// Description: Backend-agnostic interface for the expense stored procedures.
// Purpose: Define the operations every expense backend must provide.
// Dependencies: crate::core, thiserror, time
// ============================================================================

//! ## Overview
//! [`ExpenseStore`] mirrors the expense stored procedures one-to-one. Business
//! rules (draft-only edits, manager-only reviews, search semantics) belong to
//! the backend, so the service layer stays a thin mapping. Each operation has a
//! stable [`Procedure`] name used in diagnostics and audit records.
//!
//! Operations that stamp a time receive it from the caller; backends never
//! read the wall clock themselves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::DashboardStats;
use crate::core::Expense;
use crate::core::ExpenseCategory;
use crate::core::ExpenseFilter;
use crate::core::ExpenseId;
use crate::core::ExpenseStatus;
use crate::core::ExpenseUpdate;
use crate::core::NewExpense;
use crate::core::User;
use crate::core::UserId;

// ============================================================================
// SECTION: Procedure Names
// ============================================================================

/// Named procedures of the expense contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    /// Filtered expense listing.
    GetExpenses,
    /// Single expense lookup.
    GetExpenseById,
    /// Draft creation.
    CreateExpense,
    /// Draft edit.
    UpdateExpense,
    /// Draft deletion.
    DeleteExpense,
    /// Draft submission.
    SubmitExpense,
    /// Manager approval.
    ApproveExpense,
    /// Manager rejection.
    RejectExpense,
    /// Submitted claims awaiting review.
    GetPendingExpenses,
    /// Category reference data.
    GetCategories,
    /// Status reference data.
    GetStatuses,
    /// User listing.
    GetUsers,
    /// Single user lookup.
    GetUserById,
    /// Manager listing.
    GetManagers,
    /// Dashboard aggregates.
    GetDashboardStats,
    /// Most recently created claims.
    GetRecentExpenses,
}

impl Procedure {
    /// Returns the stored procedure name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetExpenses => "usp_GetExpenses",
            Self::GetExpenseById => "usp_GetExpenseById",
            Self::CreateExpense => "usp_CreateExpense",
            Self::UpdateExpense => "usp_UpdateExpense",
            Self::DeleteExpense => "usp_DeleteExpense",
            Self::SubmitExpense => "usp_SubmitExpense",
            Self::ApproveExpense => "usp_ApproveExpense",
            Self::RejectExpense => "usp_RejectExpense",
            Self::GetPendingExpenses => "usp_GetPendingExpenses",
            Self::GetCategories => "usp_GetCategories",
            Self::GetStatuses => "usp_GetStatuses",
            Self::GetUsers => "usp_GetUsers",
            Self::GetUserById => "usp_GetUserById",
            Self::GetManagers => "usp_GetManagers",
            Self::GetDashboardStats => "usp_GetDashboardStats",
            Self::GetRecentExpenses => "usp_GetRecentExpenses",
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Expense store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backing database cannot be reached.
    #[error("expense store unavailable: {0}")]
    Unavailable(String),
    /// The database engine reported an error.
    #[error("expense store error: {0}")]
    Store(String),
    /// Stored data could not be mapped to a record.
    #[error("expense store invalid data: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Expense Store
// ============================================================================

/// Expense backend implementing the stored-procedure contract.
pub trait ExpenseStore {
    /// Lists expenses matching `filter`, newest expense date first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn list_expenses(&self, filter: &ExpenseFilter) -> Result<Vec<Expense>, StoreError>;

    /// Loads one expense.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn expense_by_id(&self, id: ExpenseId) -> Result<Option<Expense>, StoreError>;

    /// Creates a draft expense, returning `None` when the user or category is
    /// unknown or inactive.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    fn create_expense(
        &self,
        expense: &NewExpense,
        now: OffsetDateTime,
    ) -> Result<Option<ExpenseId>, StoreError>;

    /// Edits a draft expense, returning whether a row changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn update_expense(&self, id: ExpenseId, update: &ExpenseUpdate) -> Result<bool, StoreError>;

    /// Deletes a draft expense, returning whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_expense(&self, id: ExpenseId) -> Result<bool, StoreError>;

    /// Moves a draft to submitted, returning whether a row changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn submit_expense(&self, id: ExpenseId, now: OffsetDateTime) -> Result<bool, StoreError>;

    /// Approves a submitted expense on behalf of an active manager.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn approve_expense(
        &self,
        id: ExpenseId,
        reviewer: UserId,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// Rejects a submitted expense on behalf of an active manager.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the update fails.
    fn reject_expense(
        &self,
        id: ExpenseId,
        reviewer: UserId,
        now: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    /// Lists submitted expenses, oldest submission first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn pending_expenses(&self, search_term: Option<&str>) -> Result<Vec<Expense>, StoreError>;

    /// Lists expense categories.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn categories(&self) -> Result<Vec<ExpenseCategory>, StoreError>;

    /// Lists expense statuses.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn statuses(&self) -> Result<Vec<ExpenseStatus>, StoreError>;

    /// Lists users.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn users(&self) -> Result<Vec<User>, StoreError>;

    /// Loads one user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Lists active managers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn managers(&self) -> Result<Vec<User>, StoreError>;

    /// Computes dashboard aggregates.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn dashboard_stats(&self) -> Result<DashboardStats, StoreError>;

    /// Lists the `top` most recently created expenses.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    fn recent_expenses(&self, top: usize) -> Result<Vec<Expense>, StoreError>;

    /// Reports store readiness.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the store is unavailable.
    fn readiness(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
