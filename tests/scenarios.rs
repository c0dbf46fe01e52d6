//! End-to-end runs over a DAI/USDC/GHO triangle: catalog to pipeline to the
//! execution guard, through the public API only.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use flashroute::arb::pipeline::{Pipeline, PipelineConfig};
use flashroute::arb::pool::{Pool, PoolLookup};
use flashroute::arb::rank::Strategy;
use flashroute::arb::route::Route;
use flashroute::arb::swap::Swap;
use flashroute::arb::types::{PoolId, TokenId};
use flashroute::guard::{
    ChainState, ExecutionGuard, ExecutionRequest, FlashLender, GuardState, RevertReason, Role,
};
use flashroute::sync::Catalog;

const GWEI: u128 = 1_000_000_000;
const E18: u128 = 1_000_000_000_000_000_000;
const DEPTH: u128 = 1_000_000 * E18;

fn addr(byte: u8) -> Address {
    Address::with_last_byte(byte)
}

fn dai() -> TokenId {
    TokenId(addr(0x01))
}

fn catalog_json(dai_reserve: u128, usdc_reserve: u128) -> String {
    format!(
        r#"{{
            "block_number": 7,
            "tokens": [
                {{"address": "{dai}", "symbol": "DAI", "decimals": 18}},
                {{"address": "{usdc}", "symbol": "USDC", "decimals": 18}},
                {{"address": "{gho}", "symbol": "GHO", "decimals": 18}}
            ],
            "pools": [
                {{"address": "{p1}", "token0": "{dai}", "token1": "{usdc}",
                  "reserve0": "{dai_reserve}", "reserve1": "{usdc_reserve}"}},
                {{"address": "{p2}", "token0": "{usdc}", "token1": "{gho}",
                  "reserve0": "{DEPTH}", "reserve1": "{DEPTH}"}},
                {{"address": "{p3}", "token0": "{gho}", "token1": "{dai}",
                  "reserve0": "{DEPTH}", "reserve1": "{DEPTH}"}}
            ]
        }}"#,
        dai = addr(0x01),
        usdc = addr(0x02),
        gho = addr(0x03),
        p1 = addr(0xf1),
        p2 = addr(0xf2),
        p3 = addr(0xf3),
    )
}

/// Pools of the triangle with P1 at the given reserves
fn pools(dai_reserve: u128, usdc_reserve: u128) -> Vec<Pool> {
    Catalog::from_json(&catalog_json(dai_reserve, usdc_reserve))
        .unwrap()
        .pools()
        .unwrap()
}

/// DAI -> USDC -> GHO -> DAI
fn triangle(chain: &ChainState) -> Route {
    let p1 = chain.pool(&PoolId(addr(0xf1))).unwrap();
    let p2 = chain.pool(&PoolId(addr(0xf2))).unwrap();
    let p3 = chain.pool(&PoolId(addr(0xf3))).unwrap();
    Route::new(vec![Swap::forward(p1), Swap::forward(p2), Swap::forward(p3)]).unwrap()
}

struct Deployment {
    chain: ChainState,
    guard: ExecutionGuard,
    bot: Address,
    lender: Address,
    treasury: Address,
}

fn deploy(pools: Vec<Pool>, lender_fee_bps: u32) -> Deployment {
    let owner = addr(0xa1);
    let bot = addr(0xb1);
    let lender = addr(0xc1);
    let treasury = addr(0xd1);

    let mut chain = ChainState::new(pools, 20 * GWEI);
    chain.add_lender(lender, FlashLender::new(lender_fee_bps));
    chain.mint(lender, dai(), U256::from(DEPTH));
    chain.fund_native(bot, U256::from(E18));

    let mut guard = ExecutionGuard::deploy(addr(0xe1));
    guard.initialize(owner, lender, treasury, 50 * GWEI).unwrap();
    guard.grant_role(owner, Role::Executor, bot).unwrap();

    Deployment {
        chain,
        guard,
        bot,
        lender,
        treasury,
    }
}

fn request(route: Route, strategy: Strategy, amount_in: U256) -> ExecutionRequest {
    ExecutionRequest {
        route,
        strategy,
        amount_in,
        min_amount_out: amount_in,
    }
}

#[tokio::test]
async fn test_found_opportunity_settles_with_flash_loan() {
    let snapshot = Catalog::from_json(&catalog_json(980_000 * E18, 1_020_000 * E18))
        .unwrap()
        .snapshot()
        .unwrap();
    let mut config = PipelineConfig::default();
    config.routes.base_tokens = vec!["DAI".to_string()];
    let report = Pipeline::new(config)
        .unwrap()
        .run_on(Arc::new(snapshot.clone()), 20 * GWEI)
        .await;

    assert_eq!(report.block_number, 7);
    assert_eq!(report.opportunities.len(), 1);
    let best = &report.opportunities[0];
    assert_eq!(best.symbols, vec!["DAI", "USDC", "GHO", "DAI"]);
    assert_eq!(best.strategy, Strategy::FlashLoan);
    assert!(best.profit_bps > 100);

    let mut d = deploy(snapshot.pools().cloned().collect(), 5);
    let receipt = d.guard.execute(
        &mut d.chain,
        d.bot,
        &ExecutionRequest::from_opportunity(best, 10),
    );
    assert_eq!(
        receipt.trail,
        vec![
            GuardState::Idle,
            GuardState::Borrowing,
            GuardState::Swapping,
            GuardState::Repaying,
            GuardState::Settled
        ]
    );
    assert_eq!(d.chain.balance(d.treasury, dai()), receipt.actual_profit);
    // The lender's fee comes out of the simulated profit
    assert!(receipt.actual_profit < best.expected_profit);
    assert!(d.chain.balance(d.lender, dai()) > U256::from(DEPTH));

    // Nothing moved between the scan and the run, so every hop fills at the
    // simulated amounts
    let quote = best.route.quote(&snapshot, best.amount_in).unwrap();
    assert_eq!(receipt.hops, quote.hops());
    assert_eq!(quote.amount_out(), best.expected_amount_out);
}

#[test]
fn test_capital_backed_route_returns_capital() {
    let mut d = deploy(pools(990_000 * E18, 1_010_000 * E18), 9);
    let capital = U256::from(5_000 * E18);
    d.chain.mint(d.guard.address(), dai(), capital);
    let route = triangle(&d.chain);

    let receipt = d.guard.execute(
        &mut d.chain,
        d.bot,
        &request(route, Strategy::CapitalBacked, U256::from(1_000 * E18)),
    );
    assert_eq!(
        receipt.trail,
        vec![
            GuardState::Idle,
            GuardState::Swapping,
            GuardState::Repaying,
            GuardState::Settled
        ]
    );
    assert_eq!(receipt.actual_profit, U256::from(7_991_280_285_051_806_345u128));
    assert_eq!(d.chain.balance(d.guard.address(), dai()), capital);
    assert_eq!(d.chain.balance(d.treasury, dai()), receipt.actual_profit);
}

#[test]
fn test_gas_spike_reverts_before_any_transfer() {
    let mut d = deploy(pools(980_000 * E18, 1_020_000 * E18), 9);
    d.chain.set_gas_price(100 * GWEI);
    let before = d.chain.clone();
    let route = triangle(&d.chain);

    let receipt = d.guard.execute(
        &mut d.chain,
        d.bot,
        &request(route, Strategy::FlashLoan, U256::from(1_000 * E18)),
    );
    assert_eq!(receipt.trail, vec![GuardState::Idle, GuardState::Reverted]);
    assert!(matches!(
        receipt.revert_reason,
        Some(RevertReason::GasPriceTooHigh { .. })
    ));
    assert_eq!(d.chain.balance(d.lender, dai()), before.balance(d.lender, dai()));
    assert_eq!(receipt.gas_fee_wei, U256::from(120_000 * 100 * GWEI));
}

#[test]
fn test_unprofitable_flash_loan_rolls_back() {
    let mut d = deploy(pools(990_000 * E18, 1_010_000 * E18), 100);
    let before = d.chain.clone();
    let route = triangle(&d.chain);

    let receipt = d.guard.execute(
        &mut d.chain,
        d.bot,
        &request(route, Strategy::FlashLoan, U256::from(1_000 * E18)),
    );
    assert_eq!(receipt.final_state, GuardState::Reverted);
    assert_eq!(
        receipt.revert_reason,
        Some(RevertReason::InsufficientRepayment {
            owed: U256::from(1_010 * E18),
            available: U256::from(1_007_991_280_285_051_806_345u128)
        })
    );
    for byte in [0xf1, 0xf2, 0xf3] {
        let id = PoolId(addr(byte));
        assert_eq!(d.chain.pool(&id), before.pool(&id));
    }
    assert_eq!(d.chain.balance(d.lender, dai()), before.balance(d.lender, dai()));
    assert!(d.chain.balance(d.treasury, dai()).is_zero());
    assert_eq!(
        d.chain.native_balance(d.bot),
        before.native_balance(d.bot) - receipt.gas_fee_wei
    );
}
