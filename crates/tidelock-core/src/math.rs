//! Integer fixed-point helpers.
//!
//! Products of amounts and fixed-point factors routinely exceed `u128`, so
//! ratios are taken over 256-bit intermediates and only the final quotient
//! is narrowed back.

use primitive_types::U256;

use crate::error::MathError;

/// Round `t` down to a multiple of `interval`. A zero interval leaves `t` as is.
pub fn align_down(t: u64, interval: u64) -> u64 {
    match t.checked_rem(interval) {
        Some(rem) => t - rem,
        None => t,
    }
}

/// Round `t` up to a multiple of `interval`.
pub fn align_up(t: u64, interval: u64) -> Result<u64, MathError> {
    match t.checked_rem(interval) {
        Some(0) | None => Ok(t),
        Some(rem) => t
            .checked_add(interval - rem)
            .ok_or(MathError::ArithmeticOverflow),
    }
}

/// `a * b / d`, floored, with a 256-bit intermediate.
pub fn mul_div(a: u128, b: u128, d: u128) -> Result<u128, MathError> {
    ratio(&[a, b], &[d])
}

/// Product of `numer` divided by the product of `denom`, floored.
///
/// Both products are formed in 256 bits; the quotient must fit in `u128`.
pub fn ratio(numer: &[u128], denom: &[u128]) -> Result<u128, MathError> {
    let n = product(numer)?;
    let d = product(denom)?;
    if d.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    narrow(n / d)
}

fn product(factors: &[u128]) -> Result<U256, MathError> {
    factors.iter().try_fold(U256::one(), |acc, &f| {
        acc.checked_mul(U256::from(f))
            .ok_or(MathError::ArithmeticOverflow)
    })
}

fn narrow(v: U256) -> Result<u128, MathError> {
    if v > U256::from(u128::MAX) {
        return Err(MathError::ArithmeticOverflow);
    }
    Ok(v.low_u128())
}

/// Convert an unsigned amount into the signed domain used by points.
pub fn to_signed(v: u128) -> Result<i128, MathError> {
    i128::try_from(v).map_err(|_| MathError::ArithmeticOverflow)
}
