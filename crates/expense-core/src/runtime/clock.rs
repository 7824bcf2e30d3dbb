// crates/expense-core/src/runtime/clock.rs
// ============================================================================
// Module: Expense Clock
// Description: Time source for stamping expense records.
// Purpose: Keep wall-clock reads at the edge so tests stay deterministic.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Stores receive timestamps from the service, and the service reads them from
//! a [`Clock`]. Production wiring uses [`SystemClock`]; tests pin time with
//! [`FixedClock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> OffsetDateTime;
}

/// Clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock that always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(OffsetDateTime);

impl FixedClock {
    /// Creates a clock pinned to `now`.
    #[must_use]
    pub const fn new(now: OffsetDateTime) -> Self {
        Self(now)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.0
    }
}
