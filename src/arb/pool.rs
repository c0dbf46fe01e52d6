use std::fmt::{self, Display};

use alloy::primitives::U256;

use super::math::{self, MathError, SwapReserves, WAD};
use super::swap::Direction;
use super::types::{PoolId, TokenId};

/// Pricing invariant of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Uniswap V2 style `x * y = k`
    ConstantProduct,
    /// Balancer style weighted pool. Weights are normalized WAD; only their
    /// ratio enters the swap math.
    Weighted {
        /// Weight of `token0`
        weight0: U256,
        /// Weight of `token1`
        weight1: U256,
    },
    /// Curve style two-coin stable pool
    StableSwap {
        /// Amplification coefficient `A`
        amplification: U256,
    },
}

impl Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstantProduct => write!(f, "constant-product"),
            Self::Weighted { .. } => write!(f, "weighted"),
            Self::StableSwap { .. } => write!(f, "stable-swap"),
        }
    }
}

/// Anything that can resolve a pool id to a pool: a registry snapshot
/// off-chain, or live chain state inside the execution guard.
pub trait PoolLookup {
    /// The pool with the given id, if known
    fn pool(&self, id: &PoolId) -> Option<&Pool>;
}

/// A two-token liquidity pool with its reserves as of some block.
///
/// Pools held by a registry snapshot are never mutated. Only the in-memory
/// chain state used by the execution guard applies swaps to its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pool {
    /// Pool address
    pub id: PoolId,
    /// First token of the pair
    pub token0: TokenId,
    /// Second token of the pair
    pub token1: TokenId,
    /// Decimals of `token0`
    pub decimals0: u8,
    /// Decimals of `token1`
    pub decimals1: u8,
    /// Pool balance of `token0`
    pub reserve0: U256,
    /// Pool balance of `token1`
    pub reserve1: U256,
    /// Swap fee in basis points
    pub fee_bps: u32,
    /// Pricing invariant
    pub kind: PoolKind,
}

impl Pool {
    /// Creates a constant-product pool with 18-decimal tokens and a 30 bps fee.
    #[must_use]
    pub const fn new(
        id: PoolId,
        token0: TokenId,
        token1: TokenId,
        reserve0: U256,
        reserve1: U256,
    ) -> Self {
        Self {
            id,
            token0,
            token1,
            decimals0: 18,
            decimals1: 18,
            reserve0,
            reserve1,
            fee_bps: 30,
            kind: PoolKind::ConstantProduct,
        }
    }

    /// Replaces the fee
    #[must_use]
    pub const fn with_fee(mut self, fee_bps: u32) -> Self {
        self.fee_bps = fee_bps;
        self
    }

    /// Replaces the invariant
    #[must_use]
    pub fn with_kind(mut self, kind: PoolKind) -> Self {
        self.kind = kind;
        self
    }

    /// Replaces the token decimals
    #[must_use]
    pub const fn with_decimals(mut self, decimals0: u8, decimals1: u8) -> Self {
        self.decimals0 = decimals0;
        self.decimals1 = decimals1;
        self
    }

    /// Whether the pool trades the given token
    #[must_use]
    pub fn contains(&self, token: TokenId) -> bool {
        self.token0 == token || self.token1 == token
    }

    /// Direction of a swap selling `token_in`, if the pool trades it
    #[must_use]
    pub fn direction_for(&self, token_in: TokenId) -> Option<Direction> {
        if token_in == self.token0 {
            Some(Direction::ZeroForOne)
        } else if token_in == self.token1 {
            Some(Direction::OneForZero)
        } else {
            None
        }
    }

    /// Reserve of one of the pool's tokens
    #[must_use]
    pub fn reserve_of(&self, token: TokenId) -> Option<U256> {
        if token == self.token0 {
            Some(self.reserve0)
        } else if token == self.token1 {
            Some(self.reserve1)
        } else {
            None
        }
    }

    /// Reserves oriented for a swap in the given direction
    #[must_use]
    pub fn swap_reserves(&self, direction: &Direction) -> SwapReserves {
        let (weight0, weight1) = match &self.kind {
            PoolKind::Weighted { weight0, weight1 } => (*weight0, *weight1),
            _ => (WAD, WAD),
        };
        match direction {
            Direction::ZeroForOne => SwapReserves {
                reserve_in: self.reserve0,
                reserve_out: self.reserve1,
                weight_in: weight0,
                weight_out: weight1,
                decimals_in: self.decimals0,
                decimals_out: self.decimals1,
            },
            Direction::OneForZero => SwapReserves {
                reserve_in: self.reserve1,
                reserve_out: self.reserve0,
                weight_in: weight1,
                weight_out: weight0,
                decimals_in: self.decimals1,
                decimals_out: self.decimals0,
            },
        }
    }

    /// Output of selling `amount_in` in the given direction at current reserves.
    ///
    /// # Errors
    ///
    /// Any math fault of the pool's invariant.
    pub fn amount_out(&self, direction: &Direction, amount_in: U256) -> Result<U256, MathError> {
        math::simulate_swap(
            &self.kind,
            amount_in,
            &self.swap_reserves(direction),
            self.fee_bps,
        )
    }

    /// Marginal price in the given direction (WAD, output per input, raw units).
    ///
    /// # Errors
    ///
    /// Any math fault of the pool's invariant.
    pub fn spot_price(&self, direction: &Direction) -> Result<U256, MathError> {
        math::spot_price(&self.kind, &self.swap_reserves(direction))
    }

    /// Moves reserves after a swap executed against this pool.
    /// The fee stays in the pool.
    pub fn apply_swap(&mut self, direction: &Direction, amount_in: U256, amount_out: U256) {
        match direction {
            Direction::ZeroForOne => {
                self.reserve0 = self.reserve0.saturating_add(amount_in);
                self.reserve1 = self.reserve1.saturating_sub(amount_out);
            }
            Direction::OneForZero => {
                self.reserve1 = self.reserve1.saturating_add(amount_in);
                self.reserve0 = self.reserve0.saturating_sub(amount_out);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::*;

    #[test]
    fn test_direction_for() {
        let p = pool("P1", "A", "B", 100, 200);
        assert_eq!(p.direction_for(token_id("A")), Some(Direction::ZeroForOne));
        assert_eq!(p.direction_for(token_id("B")), Some(Direction::OneForZero));
        assert_eq!(p.direction_for(token_id("C")), None);
    }

    #[test]
    fn test_swap_reserves_orientation() {
        let p = pool("P1", "A", "B", 100, 200);
        let forward = p.swap_reserves(&Direction::ZeroForOne);
        assert_eq!(forward.reserve_in, U256::from(100));
        assert_eq!(forward.reserve_out, U256::from(200));
        let reverse = p.swap_reserves(&Direction::OneForZero);
        assert_eq!(reverse.reserve_in, U256::from(200));
        assert_eq!(reverse.reserve_out, U256::from(100));
    }

    #[test]
    fn test_apply_swap_keeps_fee_in_pool() {
        let mut p = pool("P1", "A", "B", 1_000_000, 1_000_000);
        let out = p.amount_out(&Direction::ZeroForOne, U256::from(1000)).unwrap();
        let k_before = p.reserve0 * p.reserve1;
        p.apply_swap(&Direction::ZeroForOne, U256::from(1000), out);
        assert_eq!(p.reserve0, U256::from(1_001_000));
        assert_eq!(p.reserve1, U256::from(1_000_000) - out);
        assert!(p.reserve0 * p.reserve1 > k_before);
    }
}
