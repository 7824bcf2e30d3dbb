// crates/expense-core/src/core/mod.rs
// ============================================================================
// Module: Expense Core Types
// Description: Domain model for expense claims and reference data.
// Purpose: Group identifiers, money, dates, and record types.
// Dependencies: serde, time, bigdecimal
// ============================================================================

//! ## Overview
//! Core types are plain data. They carry no storage or transport behavior and
//! serialize with the camelCase field names used by the HTTP API.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod dates;
pub mod identifiers;
pub mod model;
pub mod money;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use dates::DateError;
pub use dates::ExpenseDate;
pub use identifiers::CategoryId;
pub use identifiers::ExpenseId;
pub use identifiers::RoleId;
pub use identifiers::StatusId;
pub use identifiers::UserId;
pub use model::CreateExpenseRequest;
pub use model::DashboardStats;
pub use model::Expense;
pub use model::ExpenseCategory;
pub use model::ExpenseFilter;
pub use model::ExpenseStatus;
pub use model::ExpenseStatusKind;
pub use model::ExpenseUpdate;
pub use model::MAX_DESCRIPTION_CHARS;
pub use model::NewExpense;
pub use model::RoleKind;
pub use model::UpdateExpenseRequest;
pub use model::User;
pub use model::ValidationError;
pub use model::matches_search;
pub use money::CURRENCY_CODE;
pub use money::Money;
pub use money::MoneyError;
