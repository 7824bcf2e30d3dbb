// crates/expense-server/src/lib.rs
// ============================================================================
// Module: Expense Server Library
// Description: HTTP API for the expense tracker.
// Purpose: Expose the server builder, route handlers, and telemetry hooks.
// Dependencies: crate::{routes, server, telemetry}
// ============================================================================

//! ## Overview
//! The server maps JSON requests onto [`expense_core::ExpenseService`] and
//! [`expense_chat::ChatService`] calls. Store and model work is blocking, so
//! every handler moves it onto the blocking pool. Each response is recorded
//! as an `http_request` audit event and a metrics observation.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod routes;
pub mod server;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use server::ExpenseServer;
pub use server::ServerError;
pub use server::ServerParts;
pub use server::ServerState;
pub use telemetry::HTTP_LATENCY_BUCKETS_MS;
pub use telemetry::HttpMetricEvent;
pub use telemetry::HttpMetrics;
pub use telemetry::HttpOutcome;
pub use telemetry::NoopMetrics;
pub use telemetry::latency_bucket;
pub use telemetry::latency_bucket_bound;
