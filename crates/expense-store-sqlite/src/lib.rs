// crates/expense-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Expense Store
// Description: Durable ExpenseStore backend using SQLite.
// Purpose: Persist expense claims and reference data behind the procedure
//          contract.
// Dependencies: expense-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`ExpenseStore`] implementation. Each
//! procedure is a single statement or transaction; lifecycle rules such as
//! draft-only edits and manager-only reviews are enforced in SQL so that a
//! row count is the procedure result.
//!
//! [`ExpenseStore`]: expense_core::ExpenseStore

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteExpenseStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::diagnose;
