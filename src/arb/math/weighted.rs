//! Weighted (Balancer-style) pool math.
//!
//! Out-given-in: `out = reserve_out * (1 - (reserve_in / (reserve_in + in)) ^ (w_in / w_out))`.
//! The power is evaluated as `exp(e * ln(b))` on signed 128-bit WAD values.

use alloy::primitives::U256;

use super::MathError;

const WAD_I: i128 = 1_000_000_000_000_000_000;
const LN_2: i128 = 693_147_180_559_945_309;
const MAX_SERIES_TERMS: i128 = 256;

/// Natural logarithm of a positive WAD value, as signed WAD.
///
/// # Errors
///
/// `InvalidInput` for zero or negative input.
pub fn ln_wad(x: i128) -> Result<i128, MathError> {
    if x <= 0 {
        return Err(MathError::InvalidInput {
            operation: "ln_wad",
            reason: format!("logarithm of non-positive value {x}"),
        });
    }
    // Reduce to [1, 2) and count powers of two
    let mut m = x;
    let mut k: i128 = 0;
    while m >= 2 * WAD_I {
        m /= 2;
        k += 1;
    }
    while m < WAD_I {
        m *= 2;
        k -= 1;
    }

    // ln(m) = 2 * atanh(z) with z = (m - 1) / (m + 1), z in [0, 1/3)
    let z = (m - WAD_I) * WAD_I / (m + WAD_I);
    let z_squared = z * z / WAD_I;
    let mut term = z;
    let mut sum: i128 = 0;
    let mut n: i128 = 1;
    while term != 0 && n < MAX_SERIES_TERMS {
        sum += term / n;
        term = term * z_squared / WAD_I;
        n += 2;
    }
    Ok(2 * sum + k * LN_2)
}

/// `e^y` for a signed WAD exponent, as WAD.
///
/// # Errors
///
/// `Overflow` when the result does not fit 128 bits.
pub fn exp_wad(y: i128) -> Result<u128, MathError> {
    // e^-42 is below one WAD unit
    if y < -42 * WAD_I {
        return Ok(0);
    }
    if y > 40 * WAD_I {
        return Err(MathError::Overflow {
            operation: "exp_wad",
        });
    }

    // y = k * ln2 + r with r in [0, ln2)
    let k = y.div_euclid(LN_2);
    let r = y - k * LN_2;

    let mut term = WAD_I;
    let mut sum = WAD_I;
    let mut n: i128 = 1;
    while term != 0 && n < MAX_SERIES_TERMS {
        term = term * r / WAD_I / n;
        sum += term;
        n += 1;
    }

    let sum = u128::try_from(sum).map_err(|_| MathError::Overflow {
        operation: "exp_wad",
    })?;
    if k >= 0 {
        let shift = u32::try_from(k).map_err(|_| MathError::Overflow {
            operation: "exp_wad",
        })?;
        sum.checked_mul(1u128 << shift).ok_or(MathError::Overflow {
            operation: "exp_wad",
        })
    } else {
        let shift = -k;
        if shift >= 128 {
            Ok(0)
        } else {
            Ok(sum >> shift)
        }
    }
}

/// `base ^ exponent` for a WAD base in `(0, 1]` and a positive WAD exponent.
///
/// # Errors
///
/// `InvalidInput` when the base is above one.
pub fn pow_wad(base: u128, exponent: u128) -> Result<u128, MathError> {
    const WAD_U: u128 = 1_000_000_000_000_000_000;
    if base > WAD_U {
        return Err(MathError::InvalidInput {
            operation: "pow_wad",
            reason: format!("base {base} above 1.0"),
        });
    }
    if base == 0 {
        return Ok(0);
    }
    if base == WAD_U || exponent == 0 {
        return Ok(WAD_U);
    }
    if exponent == WAD_U {
        return Ok(base);
    }

    let base = i128::try_from(base).map_err(|_| MathError::Overflow {
        operation: "pow_wad",
    })?;
    let exponent = i128::try_from(exponent).map_err(|_| MathError::Overflow {
        operation: "pow_wad",
    })?;
    let ln = ln_wad(base)?;
    // ln < 0 here, so an overflowing product is a vanishing power
    match ln.checked_mul(exponent) {
        Some(product) => Ok(exp_wad(product / WAD_I)?.min(WAD_U)),
        None => Ok(0),
    }
}

/// Out-given-in for a weighted pool. `amount_in` must already be net of fees.
///
/// # Errors
///
/// `DivisionByZero` for an empty pool or zero weight.
pub fn weighted_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    weight_in: U256,
    weight_out: U256,
) -> Result<U256, MathError> {
    if reserve_in.is_zero() || reserve_out.is_zero() || weight_out.is_zero() {
        return Err(MathError::DivisionByZero {
            operation: "weighted_out",
        });
    }
    let wad = super::WAD;
    let denominator = reserve_in
        .checked_add(amount_in)
        .ok_or(MathError::Overflow {
            operation: "weighted_out",
        })?;
    let base = reserve_in
        .checked_mul(wad)
        .ok_or(MathError::Overflow {
            operation: "weighted_out",
        })?
        / denominator;
    let exponent = weight_in
        .checked_mul(wad)
        .ok_or(MathError::Overflow {
            operation: "weighted_out",
        })?
        / weight_out;

    let base = u128::try_from(base).map_err(|_| MathError::Overflow {
        operation: "weighted_out",
    })?;
    let exponent = u128::try_from(exponent).map_err(|_| MathError::Overflow {
        operation: "weighted_out",
    })?;

    let power = U256::from(pow_wad(base, exponent)?);
    let ratio = wad.saturating_sub(power);
    let out = reserve_out
        .checked_mul(ratio)
        .ok_or(MathError::Overflow {
            operation: "weighted_out",
        })?
        / wad;
    // Never drain the pool
    Ok(out.min(reserve_out.saturating_sub(U256::from(1))))
}
