//! # Route Simulator
//!
//! Sweeps a ladder of input amounts through every hop of a route and keeps the
//! amount with the highest profit in bps. The sweep is a pure fold over the
//! ladder in ascending order; a later amount replaces the best only when its
//! bps are strictly higher, so ties settle on the smaller amount.
//!
//! Price impact makes bps fall as size grows on most routes, so the lowest
//! rung of the ladder is effectively the trade size. The default ladder keeps
//! its lowest rung near 0.25% of the first hop's reserve.

use std::time::{Duration, Instant};

use alloy::primitives::U256;
use derive_more::{Display, Error};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::math::{self, BPS};
use super::pool::PoolLookup;
use super::route::Route;
use super::route_quote::QuoteError;

/// Candidate input amounts of a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountLadder {
    /// `reserve_in * max_fraction_bps / 10000 / 2^k` for `k` in `0..steps`,
    /// where `reserve_in` is the first hop's input reserve
    Geometric {
        /// Number of rungs
        steps: u32,
        /// Largest rung as a fraction of the first hop's input reserve
        max_fraction_bps: u32,
    },
    /// Explicit amounts in base-token units
    Fixed(Vec<U256>),
}

impl Default for AmountLadder {
    fn default() -> Self {
        Self::Geometric {
            steps: 8,
            max_fraction_bps: 3_000,
        }
    }
}

impl AmountLadder {
    /// Rungs for a first hop with `reserve_in` liquidity: ascending, distinct,
    /// non-zero and strictly below `reserve_in`.
    #[must_use]
    pub fn amounts(&self, reserve_in: U256) -> Vec<U256> {
        let mut amounts: Vec<U256> = match self {
            Self::Geometric {
                steps,
                max_fraction_bps,
            } => {
                let top = reserve_in.saturating_mul(U256::from((*max_fraction_bps).min(BPS)))
                    / U256::from(BPS);
                (0..(*steps).min(256)).map(|k| top >> k).collect()
            }
            Self::Fixed(amounts) => amounts.clone(),
        };
        amounts.retain(|amount| !amount.is_zero() && *amount < reserve_in);
        amounts.sort_unstable();
        amounts.dedup();
        amounts
    }
}

/// Simulator parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Input amounts to try
    pub ladder: AmountLadder,
    /// Skip routes whose zero-size spread does not clear their fees
    pub prescreen: bool,
    /// Margin over fees required by the pre-screen
    pub prescreen_margin_bps: u32,
    /// Abandon a route's sweep after this long
    pub time_budget_ms: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            ladder: AmountLadder::default(),
            prescreen: true,
            prescreen_margin_bps: 0,
            time_budget_ms: None,
        }
    }
}

/// Best point of a route's sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    /// The simulated route
    pub route: Route,
    /// Chosen input amount
    pub amount_in: U256,
    /// Output of the route for `amount_in`
    pub amount_out: U256,
    /// `(amount_out - amount_in) * 10000 / amount_in`
    pub profit_bps: i64,
}

impl SimulationResult {
    /// Profit in base-token units
    #[must_use]
    pub fn profit(&self) -> U256 {
        self.amount_out.saturating_sub(self.amount_in)
    }
}

/// Why a route was excluded from a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum SimulationError {
    /// A hop could not be priced
    #[display("{_0}")]
    Quote(QuoteError),
    /// The sweep ran past its time budget
    #[display("sweep abandoned after {elapsed_ms}ms")]
    TimedOut {
        /// Time spent before giving up
        elapsed_ms: u128,
    },
}

impl From<QuoteError> for SimulationError {
    fn from(error: QuoteError) -> Self {
        Self::Quote(error)
    }
}

/// Prices routes against one snapshot.
#[derive(Debug, Clone, Default)]
pub struct Simulator {
    config: SimulatorConfig,
}

impl Simulator {
    /// Creates a simulator
    #[must_use]
    pub const fn new(config: SimulatorConfig) -> Self {
        Self { config }
    }

    /// Finds the ladder amount with the largest profit.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the route fails the pre-screen or no amount is
    /// profitable. That is a threshold miss, not an error.
    ///
    /// # Errors
    ///
    /// Unknown pools or math faults on any hop, or the time budget running out.
    pub fn simulate(
        &self,
        route: &Route,
        pools: &impl PoolLookup,
    ) -> Result<Option<SimulationResult>, SimulationError> {
        if self.config.prescreen {
            let spread = route.spot_spread_bps(pools)?;
            let fees = route.fee_bps(pools)?;
            if !math::is_above_threshold(spread, fees, self.config.prescreen_margin_bps) {
                return Ok(None);
            }
        }

        let first = route.swaps()[0];
        let reserve_in = pools
            .pool(&first.pool_id())
            .ok_or(QuoteError::UnknownPool {
                pool: first.pool_id(),
            })?
            .swap_reserves(&first.id().direction)
            .reserve_in;

        let started = Instant::now();
        let deadline = self
            .config
            .time_budget_ms
            .map(|ms| started + Duration::from_millis(ms));

        let best = self.config.ladder.amounts(reserve_in).into_iter().try_fold(
            None::<(U256, U256, i64)>,
            |best, amount_in| {
                if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    return Err(SimulationError::TimedOut {
                        elapsed_ms: started.elapsed().as_millis(),
                    });
                }
                let amount_out = route.amount_out(pools, amount_in)?;
                let profit_bps = math::profit_bps(amount_in, amount_out);
                Ok(match best {
                    Some(best) if best.2 >= profit_bps => Some(best),
                    _ => Some((amount_in, amount_out, profit_bps)),
                })
            },
        )?;

        Ok(best
            .filter(|(amount_in, amount_out, _)| amount_out > amount_in)
            .map(|(amount_in, amount_out, profit_bps)| SimulationResult {
                route: route.clone(),
                amount_in,
                amount_out,
                profit_bps,
            }))
    }

    /// Simulates every route, dropping misses and logging excluded routes.
    #[must_use]
    pub fn simulate_all(&self, routes: &[Route], pools: &impl PoolLookup) -> Vec<SimulationResult> {
        routes
            .iter()
            .filter_map(|route| match self.simulate(route, pools) {
                Ok(Some(result)) => {
                    debug!(
                        "simulate: {route} profit {} bps at {}",
                        result.profit_bps, result.amount_in
                    );
                    Some(result)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!("simulate: excluding {route}: {e}");
                    None
                }
            })
            .collect()
    }
}
