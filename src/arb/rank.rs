//! # Opportunity Ranker
//!
//! Turns simulation results into opportunities: drops results under the
//! minimum profit, picks an execution strategy from the profit alone, nets
//! out gas and orders what is left by efficiency.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt::{self, Display};

use alloy::primitives::utils::parse_units;
use alloy::primitives::{I256, U256};
use eyre::{eyre, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::math;
use super::registry::RegistrySnapshot;
use super::route::Route;
use super::simulate::SimulationResult;

/// How an opportunity gets its capital.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Borrow the input from the flash lender and repay within the transaction
    FlashLoan,
    /// Trade from the executor contract's own balance
    CapitalBacked,
}

impl Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlashLoan => write!(f, "flash-loan"),
            Self::CapitalBacked => write!(f, "capital-backed"),
        }
    }
}

/// Strategy for a result that already cleared the minimum profit.
#[must_use]
pub const fn select_strategy(profit_bps: i64, flash_loan_cutoff_bps: i64) -> Strategy {
    if profit_bps > flash_loan_cutoff_bps {
        Strategy::FlashLoan
    } else {
        Strategy::CapitalBacked
    }
}

/// Gas units charged per execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GasModel {
    /// Fixed cost of the executor call
    pub base: u64,
    /// Cost of each swap
    pub per_hop: u64,
    /// Extra cost of borrowing and repaying a flash loan
    pub flash_loan_overhead: u64,
}

impl Default for GasModel {
    fn default() -> Self {
        Self {
            base: 120_000,
            per_hop: 90_000,
            flash_loan_overhead: 60_000,
        }
    }
}

impl GasModel {
    /// Gas estimate of a route executed with the given strategy
    #[must_use]
    pub fn estimate(&self, hops: usize, strategy: Strategy) -> u64 {
        let hops = u64::try_from(hops).unwrap_or(u64::MAX);
        let overhead = match strategy {
            Strategy::FlashLoan => self.flash_loan_overhead,
            Strategy::CapitalBacked => 0,
        };
        self.base
            .saturating_add(self.per_hop.saturating_mul(hops))
            .saturating_add(overhead)
    }
}

/// Ranker parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    /// Results must be strictly above this
    pub min_profit_bps: i64,
    /// Results strictly above this use a flash loan
    pub flash_loan_cutoff_bps: i64,
    /// Gas units per execution
    pub gas: GasModel,
    /// Symbol of the chain's native token, used to price gas
    pub native_symbol: String,
    /// USD price per whole token, by symbol, as decimal strings
    pub usd_prices: BTreeMap<String, String>,
}

impl Default for RankerConfig {
    fn default() -> Self {
        // Fallback quotes; deployments configure their own
        let usd_prices = [
            ("DAI", "1"),
            ("USDC", "1"),
            ("USDT", "1"),
            ("GHO", "1"),
            ("WETH", "2500"),
        ]
        .into_iter()
        .map(|(symbol, price)| (symbol.to_string(), price.to_string()))
        .collect();
        Self {
            min_profit_bps: 23,
            flash_loan_cutoff_bps: 100,
            gas: GasModel::default(),
            native_symbol: "WETH".to_string(),
            usd_prices,
        }
    }
}

/// A route worth executing. Created once, never updated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opportunity {
    /// The route to execute
    pub route: Route,
    /// Token symbols along the route
    pub symbols: Vec<String>,
    /// Block of the snapshot the route was priced on
    pub block_number: u64,
    /// Profit in bps of `amount_in`
    pub profit_bps: i64,
    /// Optimal input amount, base-token units
    pub amount_in: U256,
    /// Simulated output for `amount_in`
    pub expected_amount_out: U256,
    /// `expected_amount_out - amount_in`
    pub expected_profit: U256,
    /// Capital source
    pub strategy: Strategy,
    /// Estimated gas units
    pub gas_estimate: u64,
    /// Profit net of gas, USD WAD
    pub efficiency_score: I256,
}

/// Filters, classifies and orders simulation results.
#[derive(Debug, Clone)]
pub struct Ranker {
    config: RankerConfig,
    usd_prices: BTreeMap<String, U256>,
    native_usd_price: U256,
}

impl Ranker {
    /// Creates a ranker, parsing the configured prices.
    ///
    /// # Errors
    ///
    /// A price that is not a decimal number, or no price for the native token.
    pub fn new(config: RankerConfig) -> Result<Self> {
        let usd_prices = config
            .usd_prices
            .iter()
            .map(|(symbol, price)| {
                let wad = parse_units(price, 18u8)
                    .map_err(|e| eyre!("invalid USD price {price} for {symbol}: {e}"))?
                    .get_absolute();
                Ok((symbol.to_ascii_uppercase(), wad))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        let native_usd_price = *usd_prices
            .get(&config.native_symbol.to_ascii_uppercase())
            .ok_or_else(|| eyre!("no USD price for native token {}", config.native_symbol))?;
        Ok(Self {
            config,
            usd_prices,
            native_usd_price,
        })
    }

    /// USD value (WAD) of `amount` raw units of a token with `decimals`
    fn usd_value(amount: U256, decimals: u8, price: U256) -> I256 {
        let scale = U256::from(10u64).pow(U256::from(decimals));
        let value = amount.saturating_mul(price) / scale;
        I256::try_from(value).unwrap_or(I256::MAX)
    }

    /// Opportunities among `results`, best first.
    ///
    /// Results at or under the minimum profit are dropped silently. Results
    /// whose base token has no USD price, or whose profit does not cover gas,
    /// are dropped with a log line.
    #[must_use]
    pub fn rank(
        &self,
        results: Vec<SimulationResult>,
        snapshot: &RegistrySnapshot,
        gas_price_wei: u128,
    ) -> Vec<Opportunity> {
        let mut opportunities: Vec<Opportunity> = results
            .into_iter()
            .filter(|result| result.profit_bps > self.config.min_profit_bps)
            .filter_map(|result| self.opportunity(result, snapshot, gas_price_wei))
            .collect();

        opportunities.sort_by_key(|o| {
            (
                Reverse(o.efficiency_score),
                Reverse(o.profit_bps),
                o.route.key(),
            )
        });
        opportunities
    }

    fn opportunity(
        &self,
        result: SimulationResult,
        snapshot: &RegistrySnapshot,
        gas_price_wei: u128,
    ) -> Option<Opportunity> {
        let base = result.route.base();
        let Some(token) = snapshot.token(&base) else {
            warn!("rank: base token {base} missing from snapshot");
            return None;
        };
        let Some(price) = self.usd_prices.get(&token.symbol.to_ascii_uppercase()) else {
            warn!("rank: no USD price for {}, dropping {}", token.symbol, result.route);
            return None;
        };

        let strategy = select_strategy(result.profit_bps, self.config.flash_loan_cutoff_bps);
        let gas_estimate = self.config.gas.estimate(result.route.hop_count(), strategy);
        let expected_profit = result.profit();
        let profit_usd = Self::usd_value(expected_profit, token.decimals, *price);
        let efficiency_score = math::efficiency_score(
            profit_usd,
            gas_estimate,
            gas_price_wei,
            self.native_usd_price,
        );
        if efficiency_score.is_negative() {
            debug!(
                "rank: {} does not cover gas ({} bps, score {})",
                result.route, result.profit_bps, efficiency_score
            );
            return None;
        }

        Some(Opportunity {
            symbols: snapshot.route_symbols(&result.route),
            block_number: snapshot.block_number(),
            profit_bps: result.profit_bps,
            amount_in: result.amount_in,
            expected_amount_out: result.amount_out,
            expected_profit,
            strategy,
            gas_estimate,
            efficiency_score,
            route: result.route,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::test_helpers::*;

    fn config() -> RankerConfig {
        let mut config = RankerConfig::default();
        config.usd_prices.insert("A".to_string(), "1".to_string());
        config.usd_prices.insert("WETH".to_string(), "2000".to_string());
        config
    }

    fn result(
        market: &RegistrySnapshot,
        pools: &[&str],
        amount_in: U256,
        profit_bps: i64,
    ) -> SimulationResult {
        let amount_out = amount_in + amount_in * U256::from(profit_bps) / U256::from(10_000);
        SimulationResult {
            route: route(market, pools, "A"),
            amount_in,
            amount_out,
            profit_bps,
        }
    }

    fn market() -> RegistrySnapshot {
        snapshot(&[
            ("P1", "A", "B", 1_000_000, 1_000_000),
            ("P2", "B", "C", 1_000_000, 1_000_000),
            ("P3", "C", "A", 1_000_000, 1_000_000),
            ("P4", "A", "C", 1_000_000, 1_000_000),
        ])
    }

    #[test]
    fn test_select_strategy() {
        assert_eq!(select_strategy(101, 100), Strategy::FlashLoan);
        assert_eq!(select_strategy(100, 100), Strategy::CapitalBacked);
        assert_eq!(select_strategy(24, 100), Strategy::CapitalBacked);
    }

    #[test]
    fn test_gas_estimate() {
        let gas = GasModel::default();
        assert_eq!(gas.estimate(3, Strategy::CapitalBacked), 390_000);
        assert_eq!(gas.estimate(3, Strategy::FlashLoan), 450_000);
    }

    #[test]
    fn test_min_profit_filter() {
        let market = market();
        let ranker = Ranker::new(config()).unwrap();
        let results = vec![
            result(&market, &["P1", "P2", "P3"], units(1_000), 23),
            result(&market, &["P4", "P2", "P1"], units(1_000), 24),
        ];
        let ranked = ranker.rank(results, &market, 1_000_000_000);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].profit_bps, 24);
        assert_eq!(ranked[0].strategy, Strategy::CapitalBacked);
        assert_eq!(ranked[0].symbols, vec!["A", "C", "B", "A"]);
    }

    #[test]
    fn test_negative_score_is_dropped() {
        let market = market();
        let ranker = Ranker::new(config()).unwrap();
        // 1 A of profit against 390k gas at 10 gwei * $2000 = $7.8
        let results = vec![result(&market, &["P1", "P2", "P3"], units(100), 100)];
        assert!(ranker.rank(results, &market, 10_000_000_000).is_empty());
    }

    #[test]
    fn test_ordering_by_score() {
        let market = market();
        let ranker = Ranker::new(config()).unwrap();
        let results = vec![
            result(&market, &["P1", "P2", "P3"], units(1_000), 50),
            result(&market, &["P4", "P2", "P1"], units(1_000), 150),
        ];
        let ranked = ranker.rank(results, &market, 1_000_000_000);
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].strategy, Strategy::FlashLoan);
        assert_eq!(ranked[0].gas_estimate, 450_000);
        assert!(ranked[0].efficiency_score > ranked[1].efficiency_score);
        assert_eq!(ranked[1].expected_profit, units(5));
    }

    #[test]
    fn test_unpriced_base_is_dropped() {
        let market = market();
        let mut config = config();
        config.usd_prices.remove("A");
        let ranker = Ranker::new(config).unwrap();
        let results = vec![result(&market, &["P1", "P2", "P3"], units(1_000), 50)];
        assert!(ranker.rank(results, &market, 1).is_empty());
    }

    #[test]
    fn test_invalid_price_config() {
        let mut config = config();
        config.usd_prices.insert("B".to_string(), "one".to_string());
        assert!(Ranker::new(config).is_err());

        let mut config = RankerConfig::default();
        config.native_symbol = "ETH".to_string();
        assert!(Ranker::new(config).is_err());
    }
}
