// crates/expense-config/src/lib.rs
// ============================================================================
// Module: Expense Config Library
// Description: Canonical config model, validation, and example generation.
// Purpose: Single source of truth for expense-tracker.toml semantics.
// Dependencies: expense-core, expense-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `expense-config` defines the configuration model for the expense tracker.
//! It provides strict, fail-closed validation and a deterministic example
//! generator used by the CLI.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
