//! Dry runs of ranked opportunities through the execution guard, on an
//! in-memory chain seeded from a registry snapshot.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};
use eyre::Result;
use log::info;

use crate::arb::math::BPS;
use crate::arb::rank::Opportunity;
use crate::arb::registry::RegistrySnapshot;
use crate::arb::types::TokenId;
use crate::guard::{ChainState, ExecutionGuard, ExecutionReceipt, ExecutionRequest, FlashLender, Role};
use crate::utils::constants::{DEFAULT_FLASH_LOAN_FEE_BPS, DEFAULT_GAS_PRICE_WEI, DEFAULT_MAX_GAS_PRICE_WEI};

/// Chain and contract parameters of a rehearsal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehearsalConfig {
    /// Network gas price
    pub gas_price_wei: u128,
    /// Executor gas price ceiling
    pub max_gas_price_wei: u128,
    /// Flash lender premium
    pub flash_loan_fee_bps: u32,
    /// Executor capital per token, as a share of that token's pooled liquidity
    pub capital_bps: u32,
    /// Tolerated shortfall below the expected output
    pub slippage_bps: u32,
}

impl Default for RehearsalConfig {
    fn default() -> Self {
        Self {
            gas_price_wei: DEFAULT_GAS_PRICE_WEI,
            max_gas_price_wei: DEFAULT_MAX_GAS_PRICE_WEI,
            flash_loan_fee_bps: DEFAULT_FLASH_LOAN_FEE_BPS,
            capital_bps: 100,
            slippage_bps: 10,
        }
    }
}

/// A deployed guard on a private chain.
#[derive(Debug)]
pub struct Rehearsal {
    chain: ChainState,
    guard: ExecutionGuard,
    executor: Address,
    treasury: Address,
    slippage_bps: u32,
}

impl Rehearsal {
    /// Seeds a chain with the snapshot's pools, a lender holding all pooled
    /// liquidity of every token, and an initialized guard.
    ///
    /// # Errors
    ///
    /// The guard rejects its initial configuration.
    pub fn new(snapshot: &RegistrySnapshot, config: &RehearsalConfig) -> Result<Self> {
        let owner = Address::with_last_byte(0xa1);
        let executor = Address::with_last_byte(0xb1);
        let lender = Address::with_last_byte(0xc1);
        let treasury = Address::with_last_byte(0xd1);
        let mut guard = ExecutionGuard::deploy(Address::with_last_byte(0xe1));

        let mut chain = ChainState::new(snapshot.pools().cloned(), config.gas_price_wei);
        chain.add_lender(lender, FlashLender::new(config.flash_loan_fee_bps));
        chain.fund_native(executor, U256::from(100u64) * U256::from(10u64).pow(U256::from(18u64)));
        for (token, liquidity) in pooled_liquidity(snapshot) {
            chain.mint(lender, token, liquidity);
            let capital = liquidity.saturating_mul(U256::from(config.capital_bps)) / U256::from(BPS);
            chain.mint(guard.address(), token, capital);
        }

        guard.initialize(owner, lender, treasury, config.max_gas_price_wei)?;
        guard.grant_role(owner, Role::Executor, executor)?;

        Ok(Self {
            chain,
            guard,
            executor,
            treasury,
            slippage_bps: config.slippage_bps,
        })
    }

    /// Executes one opportunity against the current chain state.
    pub fn execute(&mut self, opportunity: &Opportunity) -> ExecutionReceipt {
        let request = ExecutionRequest::from_opportunity(opportunity, self.slippage_bps);
        self.guard.execute(&mut self.chain, self.executor, &request)
    }

    /// Executes opportunities in order. Each sees the pools as the previous
    /// ones left them.
    pub fn execute_all(&mut self, opportunities: &[Opportunity]) -> Vec<ExecutionReceipt> {
        let receipts: Vec<ExecutionReceipt> = opportunities.iter().map(|o| self.execute(o)).collect();
        info!(
            "rehearse: {}/{} settled",
            receipts.iter().filter(|r| r.is_settled()).count(),
            receipts.len()
        );
        receipts
    }

    /// Treasury balance of `token`
    #[must_use]
    pub fn treasury_balance(&self, token: TokenId) -> U256 {
        self.chain.balance(self.treasury, token)
    }

    /// Current chain state
    #[must_use]
    pub const fn chain(&self) -> &ChainState {
        &self.chain
    }
}

/// Sum of every pool's reserve, per token
fn pooled_liquidity(snapshot: &RegistrySnapshot) -> BTreeMap<TokenId, U256> {
    let mut liquidity: BTreeMap<TokenId, U256> = BTreeMap::new();
    for pool in snapshot.pools() {
        for (token, reserve) in [(pool.token0, pool.reserve0), (pool.token1, pool.reserve1)] {
            let total = liquidity.entry(token).or_default();
            *total = total.saturating_add(reserve);
        }
    }
    liquidity
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::arb::pipeline::{Pipeline, PipelineConfig};
    use crate::arb::test_helpers::*;
    use crate::guard::{GuardState, RevertReason};

    const E18: u128 = 1_000_000_000_000_000_000;
    const DEPTH: u128 = 1_000_000 * E18;

    async fn opportunities(snapshot: RegistrySnapshot) -> Vec<Opportunity> {
        let mut config = PipelineConfig::default();
        config.routes.base_tokens = vec!["DAI".to_string()];
        Pipeline::new(config)
            .unwrap()
            .run_on(Arc::new(snapshot), DEFAULT_GAS_PRICE_WEI)
            .await
            .opportunities
    }

    fn skewed() -> RegistrySnapshot {
        snapshot_of(vec![
            pool("P1", "DAI", "USDC", 980_000 * E18, 1_020_000 * E18),
            pool("P2", "USDC", "GHO", DEPTH, DEPTH),
            pool("P3", "GHO", "DAI", DEPTH, DEPTH),
        ])
    }

    #[tokio::test]
    async fn test_rehearsal_settles_and_moves_pools() {
        let snapshot = skewed();
        let found = opportunities(snapshot.clone()).await;
        assert_eq!(found.len(), 1);

        let mut rehearsal = Rehearsal::new(&snapshot, &RehearsalConfig::default()).unwrap();
        let receipts = rehearsal.execute_all(&[found[0].clone(), found[0].clone()]);

        assert_eq!(receipts[0].final_state, GuardState::Settled);
        assert_eq!(
            rehearsal.treasury_balance(token_id("DAI")),
            receipts[0].actual_profit
        );
        // The first run closed most of the gap
        assert!(matches!(
            receipts[1].revert_reason,
            Some(RevertReason::StaleQuote { .. })
        ));
    }

    #[tokio::test]
    async fn test_rehearsal_gas_ceiling() {
        let snapshot = skewed();
        let found = opportunities(snapshot.clone()).await;
        let config = RehearsalConfig {
            gas_price_wei: 2 * DEFAULT_MAX_GAS_PRICE_WEI,
            ..RehearsalConfig::default()
        };

        let mut rehearsal = Rehearsal::new(&snapshot, &config).unwrap();
        let receipt = rehearsal.execute(&found[0]);
        assert_eq!(receipt.trail, vec![GuardState::Idle, GuardState::Reverted]);
        assert!(rehearsal.treasury_balance(token_id("DAI")).is_zero());
    }

    #[test]
    fn test_pooled_liquidity() {
        let liquidity = pooled_liquidity(&skewed());
        assert_eq!(liquidity[&token_id("DAI")], U256::from(1_980_000 * E18));
        assert_eq!(liquidity[&token_id("GHO")], U256::from(2 * DEPTH));
    }
}
