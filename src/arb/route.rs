/// Route is a Vec<Swap> that forms a cycle (first and last token are the same).
/// It is what the generator emits, the simulator prices and the guard executes.
use std::fmt::{self, Debug, Display};

use alloy::primitives::U256;
use eyre::{bail, Result};
use itertools::Itertools;

use super::math::{self, WAD};
use super::pool::PoolLookup;
use super::route_quote::{QuoteError, RouteQuote};
use super::swap::Swap;
use super::types::TokenId;

/// A cycle of swaps that starts and ends at the base token.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Route {
    /// Sequence of swaps forming the cycle
    swaps: Vec<Swap>,
}

impl Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Route({})",
            self.swaps.iter().map(|s| format!("{s:?}")).join(", ")
        )
    }
}

impl Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.tokens().iter().map(|t| format!("{t:?}")).join(" -> ")
        )
    }
}

impl Route {
    /// Creates a route from consecutive swaps.
    ///
    /// # Errors
    ///
    /// Fewer than two swaps, swaps that do not chain into a cycle, a directed
    /// pool edge used twice, or two consecutive swaps that undo each other.
    pub fn new(swaps: Vec<Swap>) -> Result<Self> {
        let route = Self { swaps };
        route.validate_swaps()?;
        Ok(route)
    }

    fn validate_swaps(&self) -> Result<()> {
        if self.swaps.len() < 2 {
            bail!("Route must have at least 2 swaps");
        }

        if !self.swaps.iter().map(Swap::id).all_unique() {
            bail!("Route contains duplicate swaps");
        }

        for i in 0..self.swaps.len() {
            let next = (i + 1) % self.swaps.len();

            if self.swaps[i].is_reciprocal(&self.swaps[next]) {
                bail!("Swap {i} and swap {next} cancel each other out");
            }

            if self.swaps[i].token_out() != self.swaps[next].token_in() {
                bail!(
                    "Swap {} token_out ({:?}) does not match swap {} token_in ({:?})",
                    i,
                    self.swaps[i].token_out(),
                    next,
                    self.swaps[next].token_in()
                );
            }
        }
        Ok(())
    }

    /// The token the route borrows, starts and ends with
    #[must_use]
    pub fn base(&self) -> TokenId {
        self.swaps[0].token_in()
    }

    /// Swaps in execution order
    #[must_use]
    pub fn swaps(&self) -> &[Swap] {
        &self.swaps
    }

    /// Number of swaps
    #[must_use]
    pub fn hop_count(&self) -> usize {
        self.swaps.len()
    }

    /// Token sequence of the cycle, base token first and last
    #[must_use]
    pub fn tokens(&self) -> Vec<TokenId> {
        std::iter::once(self.base())
            .chain(self.swaps.iter().map(Swap::token_out))
            .collect()
    }

    /// Stable textual key of the route: pool and direction of every hop
    #[must_use]
    pub fn key(&self) -> String {
        self.swaps.iter().map(|s| s.id().to_string()).join(",")
    }

    /// The `amount_out` we get from this route when we start with `amount_in`.
    ///
    /// # Errors
    ///
    /// The first hop that cannot be priced.
    pub fn amount_out(&self, pools: &impl PoolLookup, amount_in: U256) -> Result<U256, QuoteError> {
        self.swaps
            .iter()
            .try_fold(amount_in, |amount, swap| swap.amount_out(pools, amount))
    }

    /// Per-hop quote of the route for `amount_in`.
    ///
    /// # Errors
    ///
    /// The first hop that cannot be priced.
    pub fn quote(&self, pools: &impl PoolLookup, amount_in: U256) -> Result<RouteQuote, QuoteError> {
        RouteQuote::new(self, pools, amount_in)
    }

    /// Spread of the round trip at zero size, in bps: the product of every
    /// hop's marginal price against 1.0. Fees are not included.
    ///
    /// # Errors
    ///
    /// Unknown pools or math faults of any hop.
    pub fn spot_spread_bps(&self, pools: &impl PoolLookup) -> Result<i64, QuoteError> {
        let rate = self.swaps.iter().try_fold(WAD, |rate, swap| {
            let price = swap.spot_price(pools)?;
            Ok::<_, QuoteError>(rate.saturating_mul(price) / WAD)
        })?;
        Ok(math::calculate_spread_bps(rate, WAD)?)
    }

    /// Sum of the fees of every hop
    ///
    /// # Errors
    ///
    /// `UnknownPool` for a hop missing from the lookup.
    pub fn fee_bps(&self, pools: &impl PoolLookup) -> Result<u32, QuoteError> {
        self.swaps
            .iter()
            .try_fold(0u32, |total, swap| Ok(total.saturating_add(swap.fee_bps(pools)?)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::*;

    #[test]
    fn test_new_invalid_length() {
        let swaps = vec![swap("P1", "A", "B")];
        assert_eq!(
            Route::new(swaps).err().unwrap().to_string(),
            "Route must have at least 2 swaps"
        );
    }

    #[test]
    fn test_new_invalid_duplicate_swaps() {
        let swaps = vec![swap("P1", "A", "B"), swap("P2", "B", "A"), swap("P1", "A", "B")];
        assert_eq!(
            Route::new(swaps).err().unwrap().to_string(),
            "Route contains duplicate swaps"
        );
    }

    #[test]
    fn test_new_reciprocal_swaps() {
        let swaps = vec![swap("P1", "A", "B"), swap("P1", "B", "A")];
        assert_eq!(
            Route::new(swaps).err().unwrap().to_string(),
            "Swap 0 and swap 1 cancel each other out"
        );
    }

    #[test]
    fn test_new_invalid_token_mismatch() {
        let swaps = vec![swap("P1", "A", "B"), swap("P2", "C", "A")];
        let error = Route::new(swaps).err().unwrap().to_string();
        assert_eq!(
            error,
            format!(
                "Swap 0 token_out ({:?}) does not match swap 1 token_in ({:?})",
                token_id("B"),
                token_id("C")
            )
        );
    }

    #[test]
    fn test_tokens_and_base() {
        let route = Route::new(vec![
            swap("P1", "A", "B"),
            swap("P2", "B", "C"),
            swap("P3", "C", "A"),
        ])
        .unwrap();
        assert_eq!(route.base(), token_id("A"));
        assert_eq!(route.hop_count(), 3);
        assert_eq!(
            route.tokens(),
            vec![token_id("A"), token_id("B"), token_id("C"), token_id("A")]
        );
    }

    #[test]
    fn test_amount_out_matches_quote() {
        let market = snapshot(&[
            ("P1", "A", "B", 1_000_000, 2_000_000),
            ("P2", "B", "A", 3_000_000, 3_000_000),
        ]);
        let cycle = route(&market, &["P1", "P2"], "A");
        for amount in [1_000u64, 50_000, 250_000] {
            let amount = U256::from(amount);
            assert_eq!(
                cycle.amount_out(&market, amount).unwrap(),
                cycle.quote(&market, amount).unwrap().amount_out()
            );
        }
    }

    #[test]
    fn test_spot_spread_and_fees() {
        // A->B at 2, B->A at 1: the round trip doubles at zero size
        let skewed = snapshot(&[("P1", "A", "B", 100, 200), ("P2", "B", "A", 300, 300)]);
        let cycle = route(&skewed, &["P1", "P2"], "A");
        assert_eq!(cycle.spot_spread_bps(&skewed).unwrap(), 10_000);
        assert_eq!(cycle.fee_bps(&skewed).unwrap(), 60);

        let balanced = snapshot(&[("P1", "A", "B", 100, 100), ("P2", "B", "A", 100, 100)]);
        let cycle = route(&balanced, &["P1", "P2"], "A");
        assert_eq!(cycle.spot_spread_bps(&balanced).unwrap(), 0);
    }

    #[test]
    fn test_zero_fee_round_trip() {
        let market = snapshot_of(vec![
            pool("P1", "A", "B", 1_000_000_000, 1_000_000_000).with_fee(0),
            pool("P2", "B", "A", 1_000_000_000, 1_000_000_000).with_fee(0),
        ]);
        let cycle = route(&market, &["P1", "P2"], "A");
        let amount = U256::from(1_000u64);
        let out = cycle.amount_out(&market, amount).unwrap();
        assert!(out <= amount);
        assert!(amount - out <= U256::from(2));
    }
}
