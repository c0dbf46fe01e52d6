/// A swap is one directed edge of the token graph: a pool traversed `ZeroForOne`
/// or `OneForZero`. It carries no reserves; amounts are always quoted against a
/// `PoolLookup` so the same route can be priced off-chain and re-priced on-chain.
use std::fmt::{self, Debug, Display};

use alloy::primitives::U256;
use eyre::{bail, Error};

use super::pool::{Pool, PoolLookup};
use super::route_quote::QuoteError;
use super::types::{PoolId, TokenId};

/// The direction of a swap in a liquidity pool.
///
/// In a standard liquidity pool with two tokens (token0 and token1),
/// a swap can go in either direction: from token0 to token1 or from token1 to token0.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum Direction {
    /// Swap from token0 to token1 in the pool
    ZeroForOne,
    /// Swap from token1 to token0 in the pool
    OneForZero,
}

impl Direction {
    /// Checks if this direction is the opposite of another direction.
    #[must_use]
    pub fn is_opposite(&self, other: &Self) -> bool {
        self != other
    }
}

impl Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Debug for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroForOne => write!(f, "0>1"),
            Self::OneForZero => write!(f, "1>0"),
        }
    }
}

/// A unique identifier for a swap between two tokens
/// Defines the direction of the swap in a pool
#[derive(Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct SwapId {
    /// The identifier of the liquidity pool where the swap occurs
    pub pool_id: PoolId,
    /// The direction of the swap (`ZeroForOne` or `OneForZero`)
    pub direction: Direction,
}

impl Debug for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}", self.pool_id, self.direction)
    }
}

impl Display for SwapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pool_id, self.direction)
    }
}

/// A single swap between two tokens in a pool in one direction or the other.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Swap {
    /// Unique identifier for this swap, containing pool ID and direction
    id: SwapId,
    /// The token being swapped in (source token)
    token_in: TokenId,
    /// The token being swapped out (destination token)
    token_out: TokenId,
}

impl Debug for Swap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Swap({:?}, {:?} -> {:?})",
            self.id, self.token_in, self.token_out
        )
    }
}

impl Display for Swap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Swap({}, {} -> {})", self.id, self.token_in, self.token_out)
    }
}

impl Swap {
    /// Creates a new swap.
    ///
    /// # Errors
    ///
    /// Returns an error if the input and output tokens are the same.
    pub fn new(id: SwapId, token_in: TokenId, token_out: TokenId) -> Result<Self, Error> {
        if token_in == token_out {
            bail!("Swap token0 and token1 must be different");
        }
        Ok(Self {
            id,
            token_in,
            token_out,
        })
    }

    /// Returns the unique identifier for this swap.
    #[must_use]
    pub const fn id(&self) -> SwapId {
        self.id
    }

    /// Returns the pool this swap trades against.
    #[must_use]
    pub const fn pool_id(&self) -> PoolId {
        self.id.pool_id
    }

    /// Returns the token being swapped in.
    #[must_use]
    pub const fn token_in(&self) -> TokenId {
        self.token_in
    }

    /// Returns the token being swapped out.
    #[must_use]
    pub const fn token_out(&self) -> TokenId {
        self.token_out
    }

    /// Swap for the forward direction: token0 -> token1
    #[must_use]
    pub const fn forward(pool: &Pool) -> Self {
        Self {
            id: SwapId {
                pool_id: pool.id,
                direction: Direction::ZeroForOne,
            },
            token_in: pool.token0,
            token_out: pool.token1,
        }
    }

    /// Swap for the reverse direction: token1 -> token0
    #[must_use]
    pub const fn reverse(pool: &Pool) -> Self {
        Self {
            id: SwapId {
                pool_id: pool.id,
                direction: Direction::OneForZero,
            },
            token_in: pool.token1,
            token_out: pool.token0,
        }
    }

    /// Returns true if the swap side is the reciprocal of the other swap side,
    /// i.e. it has the same pool but opposite direction. Such a pair cancels
    /// itself out and is never part of a route.
    #[must_use]
    pub fn is_reciprocal(&self, other: &Self) -> bool {
        self.id.pool_id == other.id.pool_id && self.id.direction.is_opposite(&other.id.direction)
    }

    /// Output of this swap for `amount_in` against the pool as seen by `pools`.
    ///
    /// # Errors
    ///
    /// `UnknownPool` when the lookup lacks the pool, or the pool's math fault.
    pub fn amount_out(&self, pools: &impl PoolLookup, amount_in: U256) -> Result<U256, QuoteError> {
        let pool = pools
            .pool(&self.id.pool_id)
            .ok_or(QuoteError::UnknownPool {
                pool: self.id.pool_id,
            })?;
        Ok(pool.amount_out(&self.id.direction, amount_in)?)
    }

    /// Marginal price of this swap (WAD).
    ///
    /// # Errors
    ///
    /// As for [`Swap::amount_out`].
    pub fn spot_price(&self, pools: &impl PoolLookup) -> Result<U256, QuoteError> {
        let pool = pools
            .pool(&self.id.pool_id)
            .ok_or(QuoteError::UnknownPool {
                pool: self.id.pool_id,
            })?;
        Ok(pool.spot_price(&self.id.direction)?)
    }

    /// Fee charged by the pool of this swap.
    ///
    /// # Errors
    ///
    /// `UnknownPool` when the lookup lacks the pool.
    pub fn fee_bps(&self, pools: &impl PoolLookup) -> Result<u32, QuoteError> {
        pools
            .pool(&self.id.pool_id)
            .map(|pool| pool.fee_bps)
            .ok_or(QuoteError::UnknownPool {
                pool: self.id.pool_id,
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use super::*;
    use crate::arb::test_helpers::*;

    #[test]
    fn test_same_tokens() {
        let swap = Swap::new(
            SwapId {
                pool_id: pool_id("F1"),
                direction: Direction::ZeroForOne,
            },
            token_id("A"),
            token_id("A"),
        );
        assert_eq!(
            swap.err().unwrap().to_string(),
            "Swap token0 and token1 must be different"
        );
    }

    #[test]
    fn test_forward_and_reverse() {
        let p = pool("F1", "A", "B", 100, 200);
        let forward = Swap::forward(&p);
        let reverse = Swap::reverse(&p);
        assert_eq!(forward.token_in(), token_id("A"));
        assert_eq!(reverse.token_in(), token_id("B"));
        assert!(forward.is_reciprocal(&reverse));
        assert!(!forward.is_reciprocal(&forward));
    }

    #[test]
    fn test_amount_out_unknown_pool() {
        let snapshot = snapshot(&[("F1", "A", "B", 100, 200)]);
        let stray = swap("F9", "A", "B");
        assert_eq!(
            stray.amount_out(&snapshot, U256::from(10)),
            Err(QuoteError::UnknownPool {
                pool: pool_id("F9")
            })
        );
    }

    #[test]
    fn test_equality_and_hash() {
        let swap1 = swap("F1", "A", "B");
        let swap2 = swap("F1", "A", "B");

        let hash = |s: &Swap| {
            let mut hasher = DefaultHasher::new();
            s.hash(&mut hasher);
            hasher.finish()
        };

        assert_eq!(swap1, swap2);
        assert_eq!(hash(&swap1), hash(&swap2));

        let swap3 = swap("F1", "B", "A");
        assert_ne!(swap1, swap3);
        assert_ne!(hash(&swap1), hash(&swap3));
    }
}
