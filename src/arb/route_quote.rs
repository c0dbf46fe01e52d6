use alloy::primitives::U256;
use derive_more::{Display, Error};

use super::math::{self, MathError};
use super::pool::PoolLookup;
use super::route::Route;
use super::swap::Swap;
use super::types::PoolId;

/// Why a route could not be priced.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum QuoteError {
    /// A hop references a pool the lookup does not know
    #[display("unknown pool {pool}")]
    UnknownPool {
        /// The missing pool
        pool: PoolId,
    },
    /// The pool's invariant failed on the given amounts
    #[display("{_0}")]
    Math(MathError),
}

impl From<MathError> for QuoteError {
    fn from(error: MathError) -> Self {
        Self::Math(error)
    }
}

/// Amounts of a single hop of a quoted route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HopQuote {
    /// The swap that was quoted
    pub swap: Swap,
    /// Amount sold into the pool
    pub amount_in: U256,
    /// Amount bought from the pool
    pub amount_out: U256,
}

/// Quote of a complete route, hop by hop.
///
/// A `RouteQuote` threads an input amount through every hop in order, each
/// hop consuming the previous hop's output. The execution guard re-quotes
/// with it before committing to a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteQuote {
    /// The quotes for each hop in the route
    hops: Vec<HopQuote>,
}

impl RouteQuote {
    /// Creates a new route quote by simulating each hop of the route
    /// against the given pools.
    ///
    /// # Arguments
    ///
    /// * `route` - The route to quote
    /// * `pools` - Where hop pools are resolved: a snapshot or live chain state
    /// * `amount_in` - The initial amount to input into the first hop
    ///
    /// # Errors
    ///
    /// The first hop that cannot be priced aborts the quote.
    pub fn new(route: &Route, pools: &impl PoolLookup, amount_in: U256) -> Result<Self, QuoteError> {
        let mut hops = Vec::with_capacity(route.hop_count());
        route.swaps().iter().try_fold(amount_in, |amount, swap| {
            let amount_out = swap.amount_out(pools, amount)?;
            hops.push(HopQuote {
                swap: *swap,
                amount_in: amount,
                amount_out,
            });
            Ok::<_, QuoteError>(amount_out)
        })?;
        Ok(Self { hops })
    }

    /// Quotes of every hop, in route order
    #[must_use]
    pub fn hops(&self) -> &[HopQuote] {
        &self.hops
    }

    /// Returns the initial amount input into the first hop.
    #[must_use]
    pub fn amount_in(&self) -> U256 {
        self.hops.first().map_or(U256::ZERO, |hop| hop.amount_in)
    }

    /// Returns the final amount output from the last hop.
    #[must_use]
    pub fn amount_out(&self) -> U256 {
        self.hops.last().map_or(U256::ZERO, |hop| hop.amount_out)
    }

    /// Profit margin in basis points of the input (10,000 = 100%).
    #[must_use]
    pub fn profit_bps(&self) -> i64 {
        math::profit_bps(self.amount_in(), self.amount_out())
    }
}
