// crates/expense-core/tests/proptest_money.rs
// ============================================================================
// Module: Money Property-Based Tests
// Description: Fuzz-like checks for decimal pound parsing.
// Purpose: Ensure conversion to pence is exact and truncates toward zero.
// ============================================================================
//! Property-based tests for decimal pound parsing into pence.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use expense_core::Money;
use proptest::prelude::*;
use serde_json::Number;

#[test]
fn parses_common_amounts_exactly() {
    assert_eq!(Money::from_major_str("19.99").unwrap(), Money::from_minor(1999));
    assert_eq!(Money::from_major_str("25.4").unwrap(), Money::from_minor(2540));
    assert_eq!(Money::from_major_str("0.019").unwrap(), Money::from_minor(1));
    assert_eq!(Money::from_major_str("-1.239").unwrap(), Money::from_minor(-123));
    let number: Number = serde_json::from_str("0.29").unwrap();
    assert_eq!(Money::from_major(&number).unwrap(), Money::from_minor(29));
    assert!(Money::from_major_str("ten pounds").is_err());
    assert!(Money::from_major_str("1e30").is_err());
}

#[test]
fn displays_pounds_and_pence() {
    assert_eq!(Money::from_minor(2540).to_string(), "£25.40");
    assert_eq!(Money::from_minor(7).to_string(), "£0.07");
    assert_eq!(Money::from_minor(-12_300).to_string(), "-£123.00");
}

proptest! {
    #[test]
    fn whole_pence_round_trip_through_text(pounds in 0_i64..1_000_000, pence in 0_i64..100) {
        let text = format!("{pounds}.{pence:02}");
        let money = Money::from_major_str(&text).unwrap();
        prop_assert_eq!(money.minor(), pounds * 100 + pence);
        prop_assert_eq!(money.to_string(), format!("£{text}"));
    }

    #[test]
    fn sub_penny_digits_truncate(pounds in 0_i64..10_000, pence in 0_i64..100, extra in 1_u8..10) {
        let text = format!("{pounds}.{pence:02}{extra}");
        let money = Money::from_major_str(&text).unwrap();
        prop_assert_eq!(money.minor(), pounds * 100 + pence);
    }
}
