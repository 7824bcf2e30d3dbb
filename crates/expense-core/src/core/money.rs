// crates/expense-core/src/core/money.rs
// ============================================================================
// Module: Expense Money
// Description: Integer minor-unit amounts for sterling expense claims.
// Purpose: Convert decimal pound inputs into exact pence and render them.
// Dependencies: bigdecimal, serde, serde_json
// ============================================================================

//! ## Overview
//! Amounts are stored as whole pence. Decimal inputs arrive as JSON numbers and
//! are parsed through [`BigDecimal`] from their rendered form, so `19.99`
//! becomes exactly `1999` pence. Fractions of a penny are truncated toward
//! zero, matching the procedure contract's integer conversion.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use bigdecimal::ToPrimitive;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Number;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// ISO 4217 currency code for every expense amount.
pub const CURRENCY_CODE: &str = "GBP";
/// Minor units per major unit.
const MINOR_PER_MAJOR: i64 = 100;

// ============================================================================
// SECTION: Money
// ============================================================================

/// Sterling amount in minor units (pence).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    /// Amount in pence.
    minor: i64,
}

impl Money {
    /// Zero pounds.
    pub const ZERO: Self = Self::from_minor(0);

    /// Creates an amount from pence.
    #[must_use]
    pub const fn from_minor(minor: i64) -> Self {
        Self {
            minor,
        }
    }

    /// Parses a decimal pound amount from a JSON number.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] when the number is not a finite decimal or does
    /// not fit in the minor-unit range.
    pub fn from_major(number: &Number) -> Result<Self, MoneyError> {
        Self::from_major_str(&number.to_string())
    }

    /// Parses a decimal pound amount from its textual form.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError`] when the text is not a decimal or does not fit.
    pub fn from_major_str(text: &str) -> Result<Self, MoneyError> {
        let decimal = BigDecimal::from_str(text.trim())
            .map_err(|_| MoneyError::Invalid(format!("not a decimal amount: {text}")))?;
        let pence = (decimal * BigDecimal::from(MINOR_PER_MAJOR)).with_scale(0);
        let minor = pence.to_i64().ok_or(MoneyError::OutOfRange)?;
        Ok(Self::from_minor(minor))
    }

    /// Returns the amount in pence.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.minor
    }

    /// Returns the amount in pounds for JSON output.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        reason = "Expense totals stay far below 2^53 pence."
    )]
    pub fn major(self) -> f64 {
        self.minor as f64 / 100.0
    }

    /// Returns true when the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.minor > 0
    }

    /// Adds two amounts, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.minor.checked_add(other.minor) {
            Some(minor) => Some(Self::from_minor(minor)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor < 0 { "-" } else { "" };
        let magnitude = self.minor.unsigned_abs();
        write!(f, "{sign}£{}.{:02}", magnitude / 100, magnitude % 100)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Amount parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Input was not a decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),
    /// Input does not fit in the minor-unit range.
    #[error("amount out of range")]
    OutOfRange,
}
