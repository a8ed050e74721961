//! Exact amounts: integer mantissa + base-10 exponent.
//!
//! `value = mantissa * 10^exponent`. All arithmetic goes through
//! `rust_decimal::Decimal` with checked operations; floating point never
//! touches a balance.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

/// Largest number of fractional digits `Decimal` can carry.
const MAX_SCALE: u32 = 28;

/// A signed amount as posted in a distribution.
///
/// Positive amounts are debits, negative amounts are credits. Two amounts with
/// different representations (`15e-1` and `150e-2`) denote the same value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub mantissa: i64,
    pub exponent: i32,
}

impl Amount {
    pub const ZERO: Self = Self::new(0, 0);

    pub const fn new(mantissa: i64, exponent: i32) -> Self {
        Self { mantissa, exponent }
    }

    /// Convert to an exact decimal.
    ///
    /// Fails when the exponent is below the representable scale or the scaled
    /// value overflows.
    pub fn to_decimal(self) -> LedgerResult<Decimal> {
        if self.mantissa == 0 {
            return Ok(Decimal::ZERO);
        }

        if self.exponent <= 0 {
            let scale = self.exponent.unsigned_abs();
            if scale > MAX_SCALE {
                return Err(LedgerError::invalid_amount(format!(
                    "exponent {} is below the supported minimum of -{MAX_SCALE}",
                    self.exponent
                )));
            }
            return Decimal::try_new(self.mantissa, scale)
                .map_err(|e| LedgerError::invalid_amount(format!("{self}: {e}")));
        }

        let mut value = Decimal::from(self.mantissa);
        for _ in 0..self.exponent {
            value = value
                .checked_mul(Decimal::TEN)
                .ok_or_else(|| LedgerError::invalid_amount(format!("{self} overflows")))?;
        }
        Ok(value)
    }

    /// Canonical (normalized) mantissa/exponent form of a decimal.
    pub fn from_decimal(value: Decimal) -> LedgerResult<Self> {
        let normalized = value.normalize();
        let mantissa = i64::try_from(normalized.mantissa()).map_err(|_| {
            LedgerError::invalid_amount(format!("{value} does not fit a 64-bit mantissa"))
        })?;
        Ok(Self {
            mantissa,
            exponent: -(normalized.scale() as i32),
        })
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    /// The same magnitude with the opposite sign.
    pub fn checked_neg(self) -> LedgerResult<Self> {
        let mantissa = self
            .mantissa
            .checked_neg()
            .ok_or_else(|| LedgerError::invalid_amount(format!("{self} cannot be negated")))?;
        Ok(Self { mantissa, ..self })
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}e{}", self.mantissa, self.exponent)
    }
}

/// `a + b`, or `InvalidAmount` when the sum cannot be represented exactly.
///
/// `Decimal` rounds instead of failing when aligning the operands' scales
/// does not fit 96 bits, so a plain `checked_add` is not enough here.
pub fn add_exact(a: Decimal, b: Decimal) -> LedgerResult<Decimal> {
    let sum = a
        .checked_add(b)
        .ok_or_else(|| LedgerError::invalid_amount(format!("{a} + {b} overflows")))?;
    if a.is_zero() || b.is_zero() {
        return Ok(sum);
    }

    // An exact sum keeps the larger operand scale; a rounded one drops digits.
    if sum.scale() < a.scale().max(b.scale()) {
        return Err(LedgerError::invalid_amount(format!(
            "{a} + {b} cannot be represented exactly"
        )));
    }
    Ok(sum)
}

/// Exact sum of a sequence of amounts.
pub fn sum_exact<I>(amounts: I) -> LedgerResult<Decimal>
where
    I: IntoIterator<Item = Amount>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, amount| add_exact(acc, amount.to_decimal()?))
}
