// crates/expense-core/src/core/dates.rs
// ============================================================================
// Module: Expense Dates
// Description: Calendar dates for expense claims.
// Purpose: Parse, serialize, and render expense dates without a time of day.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! An [`ExpenseDate`] is the day the cost was incurred. It serializes as
//! `YYYY-MM-DD` and renders for people as `05 Mar 2026`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;
use time::Date;
use time::Duration;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Formats
// ============================================================================

/// Wire format for expense dates.
const ISO_DATE: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");
/// Display format for expense dates.
const DISPLAY_DATE: &[BorrowedFormatItem<'static>] =
    format_description!("[day] [month repr:short] [year]");

// ============================================================================
// SECTION: Expense Date
// ============================================================================

/// Calendar date of an expense.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExpenseDate(Date);

impl ExpenseDate {
    /// Wraps a calendar date.
    #[must_use]
    pub const fn new(date: Date) -> Self {
        Self(date)
    }

    /// Returns the calendar date of a UTC timestamp.
    #[must_use]
    pub const fn from_timestamp(timestamp: OffsetDateTime) -> Self {
        Self(timestamp.date())
    }

    /// Parses a `YYYY-MM-DD` date.
    ///
    /// # Errors
    ///
    /// Returns [`DateError`] when the input is not a valid calendar date.
    pub fn parse(input: &str) -> Result<Self, DateError> {
        Date::parse(input.trim(), ISO_DATE)
            .map(Self)
            .map_err(|err| DateError::Invalid(format!("{input}: {err}")))
    }

    /// Returns the underlying calendar date.
    #[must_use]
    pub const fn date(self) -> Date {
        self.0
    }

    /// Returns the date `days` earlier, saturating at the calendar minimum.
    #[must_use]
    pub fn days_before(self, days: i64) -> Self {
        Self(self.0.checked_sub(Duration::days(days)).unwrap_or(Date::MIN))
    }

    /// Renders the date as `YYYY-MM-DD`.
    #[must_use]
    pub fn to_iso(self) -> String {
        self.0.format(ISO_DATE).unwrap_or_default()
    }

    /// Renders the date as `05 Mar 2026`.
    #[must_use]
    pub fn display(self) -> String {
        self.0.format(DISPLAY_DATE).unwrap_or_default()
    }
}

impl fmt::Display for ExpenseDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_iso())
    }
}

impl Serialize for ExpenseDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_iso())
    }
}

impl<'de> Deserialize<'de> for ExpenseDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Date parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    /// Input is not a `YYYY-MM-DD` calendar date.
    #[error("invalid date: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use time::macros::date;

    use super::ExpenseDate;

    #[test]
    fn parses_and_renders_dates() {
        let parsed = ExpenseDate::parse("2026-03-05").unwrap();
        assert_eq!(parsed.date(), date!(2026 - 03 - 05));
        assert_eq!(parsed.to_iso(), "2026-03-05");
        assert_eq!(parsed.display(), "05 Mar 2026");
    }

    #[test]
    fn rejects_non_calendar_dates() {
        assert!(ExpenseDate::parse("2026-02-30").is_err());
        assert!(ExpenseDate::parse("05/03/2026").is_err());
    }

    #[test]
    fn days_before_crosses_month_boundaries() {
        let start = ExpenseDate::new(date!(2026 - 03 - 02));
        assert_eq!(start.days_before(5).to_iso(), "2026-02-25");
    }

    #[test]
    fn serializes_as_iso_string() {
        let value = ExpenseDate::new(date!(2025 - 12 - 31));
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"2025-12-31\"");
        let back: ExpenseDate = serde_json::from_str(&json).unwrap();
        assert_eq!(back, value);
    }
}
