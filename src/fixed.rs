//! Two-decimal fixed-point quantities stored as integer hundredths.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::AppError;

pub const SCALE: u32 = 2;

/// Rounds half away from zero to two places, the way a `NUMERIC(_, 2)` column would.
pub fn normalize(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(SCALE);
    rounded
}

pub fn to_hundredths(value: Decimal) -> Result<i64, AppError> {
    normalize(value)
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|hundredths| hundredths.to_i64())
        .ok_or_else(|| AppError::Validation(format!("Value {} is out of range", value)))
}

pub fn from_hundredths(hundredths: i64) -> Decimal {
    Decimal::new(hundredths, SCALE)
}
