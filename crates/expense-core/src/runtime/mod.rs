// crates/expense-core/src/runtime/mod.rs
// ============================================================================
// Module: Expense Runtime
// Description: Stores, demo data, clocks, and the fallback-aware service.
// Purpose: Execute expense procedures against a backend and degrade to demo
//          data when the backend is unreachable.
// Dependencies: crate::{core, interfaces, audit}
// ============================================================================

//! ## Overview
//! Runtime modules provide the in-memory backend, the fixed demo data set, and
//! [`ExpenseService`], the single entry point used by the HTTP API and the
//! chat assistant.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod clock;
pub mod demo;
pub mod service;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::Clock;
pub use clock::FixedClock;
pub use clock::SystemClock;
pub use service::DataSourceStatus;
pub use service::ExpenseService;
pub use service::ExpenseServiceError;
pub use store::InMemoryExpenseStore;
pub use store::SharedExpenseStore;
pub use store::UnavailableExpenseStore;
