//! Two-coin StableSwap (Curve) invariant.
//!
//! `A·n^n·Σx + D = A·n^n·D + D^(n+1) / (n^n·Πx)` has no closed form. `D` is
//! found by Newton iteration, then the post-swap balance of the output coin is
//! found by a second Newton iteration holding `D` fixed. Balances are scaled to
//! 18 decimals so coins with different precision share one curve.

use alloy::primitives::U256;

use super::MathError;

/// Iteration cap for both Newton solves
pub const MAX_NEWTON_ITERATIONS: usize = 255;

const N_COINS: u64 = 2;
const PRECISION_DECIMALS: u8 = 18;

fn overflow(operation: &'static str) -> MathError {
    MathError::Overflow { operation }
}

fn to_precision(amount: U256, decimals: u8) -> Result<U256, MathError> {
    if decimals <= PRECISION_DECIMALS {
        let factor = U256::from(10u64).pow(U256::from(PRECISION_DECIMALS - decimals));
        amount.checked_mul(factor).ok_or(overflow("stable_swap_scale"))
    } else {
        let factor = U256::from(10u64).pow(U256::from(decimals - PRECISION_DECIMALS));
        Ok(amount / factor)
    }
}

fn from_precision(amount: U256, decimals: u8) -> Result<U256, MathError> {
    if decimals <= PRECISION_DECIMALS {
        let factor = U256::from(10u64).pow(U256::from(PRECISION_DECIMALS - decimals));
        Ok(amount / factor)
    } else {
        let factor = U256::from(10u64).pow(U256::from(decimals - PRECISION_DECIMALS));
        amount.checked_mul(factor).ok_or(overflow("stable_swap_scale"))
    }
}

fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Solves the invariant `D` for two precision-scaled balances.
///
/// # Errors
///
/// `DivisionByZero` for an empty coin, `NonConvergence` if Newton does not
/// settle within [`MAX_NEWTON_ITERATIONS`].
pub fn stable_swap_d(balances: [U256; 2], amplification: U256) -> Result<U256, MathError> {
    if balances.iter().any(U256::is_zero) {
        return Err(MathError::DivisionByZero {
            operation: "stable_swap_d",
        });
    }
    let n = U256::from(N_COINS);
    let sum = balances[0]
        .checked_add(balances[1])
        .ok_or(overflow("stable_swap_d"))?;
    let ann = amplification
        .checked_mul(U256::from(N_COINS * N_COINS))
        .ok_or(overflow("stable_swap_d"))?;
    if ann.is_zero() {
        return Err(MathError::InvalidInput {
            operation: "stable_swap_d",
            reason: "amplification must be positive".to_string(),
        });
    }

    let mut d = sum;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        // d_p = D^(n+1) / (n^n * Πx), built one coin at a time
        let mut d_p = d;
        for balance in &balances {
            d_p = d_p.checked_mul(d).ok_or(overflow("stable_swap_d"))? / (*balance * n);
        }
        let previous = d;

        let numerator = ann
            .checked_mul(sum)
            .and_then(|v| v.checked_add(d_p * n))
            .and_then(|v| v.checked_mul(d))
            .ok_or(overflow("stable_swap_d"))?;
        let denominator = (ann - U256::from(1))
            .checked_mul(d)
            .and_then(|v| v.checked_add((n + U256::from(1)) * d_p))
            .ok_or(overflow("stable_swap_d"))?;
        if denominator.is_zero() {
            return Err(MathError::DivisionByZero {
                operation: "stable_swap_d",
            });
        }
        d = numerator / denominator;

        if abs_diff(d, previous) <= U256::from(1) {
            return Ok(d);
        }
    }
    Err(MathError::NonConvergence {
        operation: "stable_swap_d",
        iterations: MAX_NEWTON_ITERATIONS,
    })
}

/// Balance of the output coin that keeps `D` constant once the input coin
/// holds `x_in`.
///
/// # Errors
///
/// `DivisionByZero` or `NonConvergence` as for [`stable_swap_d`].
fn stable_swap_y(x_in: U256, d: U256, amplification: U256) -> Result<U256, MathError> {
    if x_in.is_zero() {
        return Err(MathError::DivisionByZero {
            operation: "stable_swap_y",
        });
    }
    let n = U256::from(N_COINS);
    let ann = amplification * U256::from(N_COINS * N_COINS);

    // c = D^(n+1) / (n^n * x_in * Ann)
    let c = d.checked_mul(d).ok_or(overflow("stable_swap_y"))? / (x_in * n);
    let c = c.checked_mul(d).ok_or(overflow("stable_swap_y"))? / (ann * n);
    let b = x_in + d / ann;

    let mut y = d;
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let previous = y;
        let numerator = y
            .checked_mul(y)
            .and_then(|v| v.checked_add(c))
            .ok_or(overflow("stable_swap_y"))?;
        let partial = (y * U256::from(2)).checked_add(b).ok_or(overflow("stable_swap_y"))?;
        if partial <= d {
            return Err(MathError::InvalidInput {
                operation: "stable_swap_y",
                reason: format!("negative Newton denominator (2y+b={partial}, D={d})"),
            });
        }
        y = numerator / (partial - d);

        if abs_diff(y, previous) <= U256::from(1) {
            return Ok(y);
        }
    }
    Err(MathError::NonConvergence {
        operation: "stable_swap_y",
        iterations: MAX_NEWTON_ITERATIONS,
    })
}

/// Output of a StableSwap trade. `amount_in` must already be net of fees.
///
/// # Errors
///
/// `DivisionByZero` for an empty pool, `NonConvergence` when either Newton
/// solve fails. Non-convergence on real reserves means the pool data is bad.
pub fn stable_swap_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    amplification: U256,
    decimals_in: u8,
    decimals_out: u8,
) -> Result<U256, MathError> {
    let x_in = to_precision(reserve_in, decimals_in)?;
    let x_out = to_precision(reserve_out, decimals_out)?;
    let dx = to_precision(amount_in, decimals_in)?;

    let d = stable_swap_d([x_in, x_out], amplification)?;
    let y = stable_swap_y(x_in.checked_add(dx).ok_or(overflow("stable_swap_out"))?, d, amplification)?;
    // One unit lost to rounding, as Curve does
    let dy = x_out.saturating_sub(y).saturating_sub(U256::from(1));
    from_precision(dy, decimals_out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::math::{constant_product_out, WAD};

    #[test]
    fn test_d_balanced_pool_is_sum() {
        let x = U256::from(1_000_000u64) * WAD;
        let d = stable_swap_d([x, x], U256::from(100)).unwrap();
        assert!(abs_diff(d, x * U256::from(2)) <= U256::from(2));
    }

    #[test]
    fn test_d_empty_pool() {
        assert_eq!(
            stable_swap_d([U256::ZERO, WAD], U256::from(100)),
            Err(MathError::DivisionByZero {
                operation: "stable_swap_d"
            })
        );
    }

    #[test]
    fn test_low_slippage_near_peg() {
        let reserve = U256::from(10_000_000u64) * WAD;
        let amount = U256::from(100_000u64) * WAD;
        let out =
            stable_swap_out(amount, reserve, reserve, U256::from(200), 18, 18).unwrap();
        let cp = constant_product_out(amount, reserve, reserve).unwrap();

        // Stable curve beats x*y=k near the peg and stays under 1:1
        assert!(out > cp);
        assert!(out < amount);
        // ~1bp of slippage for a 1% of pool trade at A=200
        assert!(out > amount * U256::from(9_990) / U256::from(10_000), "{out}");
    }

    #[test]
    fn test_mixed_decimals() {
        // USDC (6) -> DAI (18), both 1M deep
        let usdc = U256::from(1_000_000u64) * U256::from(1_000_000u64);
        let dai = U256::from(1_000_000u64) * WAD;
        let amount = U256::from(1_000u64) * U256::from(1_000_000u64);

        let out = stable_swap_out(amount, usdc, dai, U256::from(100), 6, 18).unwrap();
        let expected = U256::from(1_000u64) * WAD;
        assert!(out < expected);
        assert!(out > expected * U256::from(9_999) / U256::from(10_000), "{out}");
    }

    #[test]
    fn test_monotonic_in_amount() {
        let reserve_in = U256::from(3_000_000u64) * WAD;
        let reserve_out = U256::from(2_000_000u64) * WAD;
        let mut previous = U256::ZERO;
        for k in 1..=20u64 {
            let amount = U256::from(k * 10_000) * WAD;
            let out = stable_swap_out(amount, reserve_in, reserve_out, U256::from(50), 18, 18)
                .unwrap();
            assert!(out > previous);
            previous = out;
        }
    }
}
