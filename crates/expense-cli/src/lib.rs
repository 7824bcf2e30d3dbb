// crates/expense-cli/src/lib.rs
// ============================================================================
// Module: Expense Tracker CLI Library
// Description: Shared helpers for the expense tracker command-line interface.
// Purpose: Provide the message catalog to the binary and its tests.
// Dependencies: Standard library.
// ============================================================================

//! ## Overview
//! This library houses the CLI message catalog. The binary entry point
//! (`src/main.rs`) routes every user-facing string through [`t!`] so output
//! stays consistent.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Message catalog and translation helpers.
pub mod i18n;
