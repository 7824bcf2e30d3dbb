// crates/expense-core/src/lib.rs
// ============================================================================
// Module: Expense Core Library
// Description: Public API surface for the expense tracker core.
// Purpose: Expose domain types, the procedure contract, and runtime services.
// Dependencies: crate::{core, interfaces, runtime, audit}
// ============================================================================

//! ## Overview
//! Expense core models expense claims, users, and reference data, and defines
//! the stored-procedure contract every backend implements. The runtime layer
//! wraps a backend in [`ExpenseService`], which falls back to fixed demo data
//! when the backend is unreachable and records why.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use audit::AuditDetail;
pub use audit::AuditEvent;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::ExpenseStore;
pub use interfaces::Procedure;
pub use interfaces::StoreError;
pub use runtime::Clock;
pub use runtime::DataSourceStatus;
pub use runtime::ExpenseService;
pub use runtime::ExpenseServiceError;
pub use runtime::FixedClock;
pub use runtime::InMemoryExpenseStore;
pub use runtime::SharedExpenseStore;
pub use runtime::SystemClock;
pub use runtime::UnavailableExpenseStore;
