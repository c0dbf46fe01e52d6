//! # AMM Math Engine
//!
//! Pure, deterministic integer arithmetic for every supported pool invariant.
//! No floating point anywhere: results must match what the executor contract
//! computes on-chain, bit for bit.
//!
//! Prices and exponents are WAD fixed-point (`1e18 == 1.0`). Fees and spreads
//! are basis points (`10_000 == 100%`).

mod stable;
mod weighted;

use alloy::primitives::{I256, U256};
use derive_more::{Display, Error};

use super::pool::PoolKind;

pub use stable::{stable_swap_d, stable_swap_out, MAX_NEWTON_ITERATIONS};
pub use weighted::{exp_wad, ln_wad, pow_wad, weighted_out};

/// Fixed-point unit, `1.0` in WAD precision
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// One hundred percent in basis points
pub const BPS: u32 = 10_000;

/// Faults raised by the math engine.
///
/// None of these are expected for well-formed pool data. A route that hits one
/// is excluded from the current cycle and never retried with the same inputs.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum MathError {
    /// A divisor was zero, typically a zero-liquidity pool
    #[display("division by zero in {operation}")]
    DivisionByZero {
        /// Operation that failed
        operation: &'static str,
    },
    /// An iterative solver did not converge within its iteration cap
    #[display("{operation} did not converge after {iterations} iterations")]
    NonConvergence {
        /// Operation that failed
        operation: &'static str,
        /// Iterations spent before giving up
        iterations: usize,
    },
    /// An intermediate value exceeded 256 bits
    #[display("arithmetic overflow in {operation}")]
    Overflow {
        /// Operation that failed
        operation: &'static str,
    },
    /// Inputs outside the domain of the formula
    #[display("invalid input to {operation}: {reason}")]
    InvalidInput {
        /// Operation that failed
        operation: &'static str,
        /// What was wrong with the input
        reason: String,
    },
}

/// Reserves seen from the direction of a swap: what goes in, what comes out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapReserves {
    /// Pool balance of the token being sold
    pub reserve_in: U256,
    /// Pool balance of the token being bought
    pub reserve_out: U256,
    /// Normalized weight of the input token (WAD). `WAD` for unweighted pools.
    pub weight_in: U256,
    /// Normalized weight of the output token (WAD). `WAD` for unweighted pools.
    pub weight_out: U256,
    /// Decimals of the input token
    pub decimals_in: u8,
    /// Decimals of the output token
    pub decimals_out: u8,
}

/// Implied spot price of the output token in units of the input token, as WAD.
///
/// `price = (reserve_out / weight_out) / (reserve_in / weight_in)`. With equal
/// weights this degenerates to `reserve_out / reserve_in`.
///
/// # Errors
///
/// `DivisionByZero` when `reserve_in` or `weight_out` is zero.
pub fn implied_price(
    reserve_in: U256,
    reserve_out: U256,
    weight_in: U256,
    weight_out: U256,
) -> Result<U256, MathError> {
    let denominator = reserve_in
        .checked_mul(weight_out)
        .ok_or(MathError::Overflow {
            operation: "implied_price",
        })?;
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero {
            operation: "implied_price",
        });
    }
    let numerator = reserve_out
        .checked_mul(weight_in)
        .and_then(|n| n.checked_mul(WAD))
        .ok_or(MathError::Overflow {
            operation: "implied_price",
        })?;
    Ok(numerator / denominator)
}

/// Marginal spot price of a swap direction as WAD, for any invariant.
///
/// Constant-product and weighted pools have a closed form. Stable-swap pools
/// are priced by a fee-less probe swap of one millionth of the input reserve.
///
/// # Errors
///
/// Propagates math faults of the underlying formula.
pub fn spot_price(kind: &PoolKind, reserves: &SwapReserves) -> Result<U256, MathError> {
    match kind {
        PoolKind::ConstantProduct | PoolKind::Weighted { .. } => implied_price(
            reserves.reserve_in,
            reserves.reserve_out,
            reserves.weight_in,
            reserves.weight_out,
        ),
        PoolKind::StableSwap { .. } => {
            let probe = (reserves.reserve_in / U256::from(1_000_000)).max(U256::from(1));
            let out = simulate_swap(kind, probe, reserves, 0)?;
            Ok(out.saturating_mul(WAD) / probe)
        }
    }
}

/// Applies the pool fee to the input amount: `amount_in * (10000 - fee_bps) / 10000`.
///
/// # Errors
///
/// `InvalidInput` when the fee exceeds 100%.
pub fn apply_fee(amount_in: U256, fee_bps: u32) -> Result<U256, MathError> {
    if fee_bps > BPS {
        return Err(MathError::InvalidInput {
            operation: "apply_fee",
            reason: format!("fee {fee_bps} bps exceeds 100%"),
        });
    }
    let scaled = amount_in
        .checked_mul(U256::from(BPS - fee_bps))
        .ok_or(MathError::Overflow {
            operation: "apply_fee",
        })?;
    Ok(scaled / U256::from(BPS))
}

/// Output amount of a swap under the pool's invariant. The fee is taken from
/// the input first, then the invariant formula is applied to the remainder.
///
/// # Errors
///
/// Any `MathError` of the invariant: zero liquidity, overflow, or stable-swap
/// non-convergence.
pub fn simulate_swap(
    kind: &PoolKind,
    amount_in: U256,
    reserves: &SwapReserves,
    fee_bps: u32,
) -> Result<U256, MathError> {
    let effective_in = apply_fee(amount_in, fee_bps)?;
    match kind {
        PoolKind::ConstantProduct => {
            constant_product_out(effective_in, reserves.reserve_in, reserves.reserve_out)
        }
        PoolKind::Weighted { .. } => weighted_out(
            effective_in,
            reserves.reserve_in,
            reserves.reserve_out,
            reserves.weight_in,
            reserves.weight_out,
        ),
        PoolKind::StableSwap { amplification } => stable_swap_out(
            effective_in,
            reserves.reserve_in,
            reserves.reserve_out,
            *amplification,
            reserves.decimals_in,
            reserves.decimals_out,
        ),
    }
}

/// `x * y = k`: `reserve_out * amount_in / (reserve_in + amount_in)`
///
/// # Errors
///
/// `DivisionByZero` for an empty pool, `Overflow` for absurd reserves.
pub fn constant_product_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
) -> Result<U256, MathError> {
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(MathError::DivisionByZero {
            operation: "constant_product_out",
        });
    }
    let numerator = reserve_out
        .checked_mul(amount_in)
        .ok_or(MathError::Overflow {
            operation: "constant_product_out",
        })?;
    let denominator = reserve_in
        .checked_add(amount_in)
        .ok_or(MathError::Overflow {
            operation: "constant_product_out",
        })?;
    Ok(numerator / denominator)
}

/// Signed spread between two prices in basis points: `(p1 - p2) * 10000 / p2`.
/// Saturates at the `i64` range.
///
/// # Errors
///
/// `DivisionByZero` when `price2` is zero. Callers must reject zero-liquidity
/// pools before they get here.
pub fn calculate_spread_bps(price1: U256, price2: U256) -> Result<i64, MathError> {
    if price2.is_zero() {
        return Err(MathError::DivisionByZero {
            operation: "calculate_spread_bps",
        });
    }
    let (diff, negative) = if price1 >= price2 {
        (price1 - price2, false)
    } else {
        (price2 - price1, true)
    };
    let magnitude = diff.saturating_mul(U256::from(BPS)) / price2;
    let magnitude = i64::try_from(magnitude).unwrap_or(i64::MAX);
    Ok(if negative { -magnitude } else { magnitude })
}

/// Whether a spread clears the fees plus the minimum profit margin.
#[must_use]
pub fn is_above_threshold(spread_bps: i64, fee_bps: u32, margin_bps: u32) -> bool {
    spread_bps > i64::from(fee_bps) + i64::from(margin_bps)
}

/// Profit of a round trip in basis points of the input: `(out - in) * 10000 / in`.
/// Zero input yields zero.
#[must_use]
pub fn profit_bps(amount_in: U256, amount_out: U256) -> i64 {
    if amount_in.is_zero() {
        return 0;
    }
    calculate_spread_bps(amount_out, amount_in).unwrap_or(0)
}

/// Gas-adjusted value of executing a route, in USD WAD.
///
/// Subtracts `gas_used * gas_price_wei` (wei, converted with the native token's
/// USD price in WAD) from the expected profit. Negative means the route is not
/// worth executing.
#[must_use]
pub fn efficiency_score(
    expected_profit_usd: I256,
    gas_used: u64,
    gas_price_wei: u128,
    native_usd_price: U256,
) -> I256 {
    let gas_cost_wei = U256::from(gas_used).saturating_mul(U256::from(gas_price_wei));
    let gas_cost_usd = gas_cost_wei.saturating_mul(native_usd_price) / WAD;
    let gas_cost_usd = I256::try_from(gas_cost_usd).unwrap_or(I256::MAX);
    expected_profit_usd.saturating_sub(gas_cost_usd)
}
