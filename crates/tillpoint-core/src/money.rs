//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Offline clients send amounts as JSON numbers:                          │
//! │    {"amount": 0.1} + {"amount": 0.2} = 0.30000000000000004  ❌          │
//! │                                                                         │
//! │  "Is the invoice fully paid?" must never depend on that last digit.     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Amounts are parsed from their decimal TEXT straight into cents.      │
//! │    "0.1" → 10, "0.2" → 20, 10 + 20 = 30 == "0.30" ✓                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tillpoint_core::money::Money;
//!
//! let price = Money::from_cents(1099);                            // 10.99
//! let total = price.checked_add(Money::from_cents(500)).unwrap();  // 15.99
//! assert_eq!(total.to_string(), "15.99");
//!
//! // Arithmetic is checked: overflow is a value, never a panic
//! assert!(Money::MAX.checked_add(Money::from_cents(1)).is_some());
//! assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
//!
//! let parsed = Money::parse_decimal("12.5").unwrap();
//! assert_eq!(parsed.cents(), 1250);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Where Money is Used
/// ```text
/// payload.items[].rate ──► InvoiceItem.amount ──► grand_total ──► rounded_total
///                                                                     │
/// payload.payments[].amount ──► PaymentRow.amount ──► paid_amount ◄───┘
///                                                    (must cover total)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Largest rate, line amount or payment a sale may carry (10 trillion units).
    pub const MAX: Money = Money(1_000_000_000_000_000);

    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Parses a decimal amount ("12", "12.5", "-3.10") into cents.
    ///
    /// ## Rules
    /// - Up to two fractional digits are taken exactly
    /// - A third fractional digit rounds half away from zero, the rest are ignored
    /// - Exponent notation ("1e3") goes through `f64` and is rounded to cents
    ///
    /// Returns `None` for anything that is not a finite number.
    ///
    /// ## Example
    /// ```rust
    /// use tillpoint_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("0.1").unwrap().cents(), 10);
    /// assert_eq!(Money::parse_decimal("-3.105").unwrap().cents(), -311);
    /// assert!(Money::parse_decimal("abc").is_none());
    /// ```
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        if text.contains(['e', 'E']) {
            let value: f64 = text.parse().ok()?;
            return Self::from_scaled(value * 100.0);
        }

        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };

        let (major, minor) = match digits.split_once('.') {
            Some((major, minor)) => (major, minor),
            None => (digits, ""),
        };

        if major.is_empty() && minor.is_empty() {
            return None;
        }
        if !major.chars().all(|c| c.is_ascii_digit()) || !minor.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }

        let major: i64 = if major.is_empty() { 0 } else { major.parse().ok()? };
        let mut minor_digits = minor.chars().map(|c| c as i64 - '0' as i64);
        let tens = minor_digits.next().unwrap_or(0);
        let units = minor_digits.next().unwrap_or(0);
        let round_up = minor_digits.next().is_some_and(|d| d >= 5);

        let mut cents = major.checked_mul(100)?.checked_add(tens * 10 + units)?;
        if round_up {
            cents = cents.checked_add(1)?;
        }

        Some(Money(if negative { -cents } else { cents }))
    }

    /// Multiplies a unit rate by a (possibly fractional) quantity.
    ///
    /// The product is rounded to the nearest cent, half away from zero.
    /// Returns `None` when it is not finite or leaves the `i64` range.
    pub fn times_qty(&self, qty: f64) -> Option<Self> {
        Self::from_scaled(self.0 as f64 * qty)
    }

    /// Rounds a cent amount held in an `f64`, refusing values `i64` cannot hold.
    fn from_scaled(cents: f64) -> Option<Self> {
        let cents = cents.round();
        // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive
        if !cents.is_finite() || cents < i64::MIN as f64 || cents >= i64::MAX as f64 {
            return None;
        }
        Some(Money(cents as i64))
    }

    /// Checked addition. Returns `None` on overflow.
    #[inline]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Checked subtraction. Returns `None` on overflow.
    #[inline]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Sums amounts, or `None` if the running total overflows.
    ///
    /// ## Example
    /// ```rust
    /// use tillpoint_core::money::Money;
    ///
    /// let rows = [Money::from_cents(505), Money::from_cents(-5)];
    /// assert_eq!(Money::checked_sum(rows), Some(Money::from_cents(500)));
    /// assert_eq!(Money::checked_sum([Money::from_cents(i64::MAX), Money::from_cents(1)]), None);
    /// ```
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, amount| acc.checked_add(amount))
    }

    /// Rounds to the nearest whole currency unit, half away from zero.
    ///
    /// ## Example
    /// ```rust
    /// use tillpoint_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1249).round_to_major().cents(), 1200);
    /// assert_eq!(Money::from_cents(1250).round_to_major().cents(), 1300);
    /// ```
    pub fn round_to_major(&self) -> Self {
        let remainder = self.0 % 100;
        let base = self.0 - remainder;
        if remainder.abs() >= 50 {
            Money(base.saturating_add(100 * remainder.signum()))
        } else {
            Money(base)
        }
    }
}

// =============================================================================
// Display
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
