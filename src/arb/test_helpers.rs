use alloy::primitives::{Address, U256};

use super::pool::{Pool, PoolLookup};
use super::registry::RegistrySnapshot;
use super::route::Route;
use super::swap::{Direction, Swap, SwapId};
use super::token::Token;
use super::types::{PoolId, TokenId};

/// Address whose low bytes spell the label, so labels sort like addresses
#[allow(dead_code)]
pub fn address_from_str(label: &str) -> Address {
    Address::left_padding_from(label.as_bytes())
}

#[allow(dead_code)]
pub fn token_id(label: &str) -> TokenId {
    TokenId(address_from_str(label))
}

#[allow(dead_code)]
pub fn pool_id(label: &str) -> PoolId {
    PoolId(address_from_str(label))
}

#[allow(dead_code)]
pub fn token(label: &str) -> Token {
    Token::new(token_id(label), label, 18)
}

/// `n` whole tokens of 18 decimals
#[allow(dead_code)]
pub fn units(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000_000_000_000_000u64)
}

#[allow(dead_code)]
pub fn pool(label: &str, token0: &str, token1: &str, reserve0: u128, reserve1: u128) -> Pool {
    Pool::new(
        pool_id(label),
        token_id(token0),
        token_id(token1),
        U256::from(reserve0),
        U256::from(reserve1),
    )
}

/// A detached swap; the direction follows label order
#[allow(dead_code)]
pub fn swap(pool_label: &str, token_in: &str, token_out: &str) -> Swap {
    let direction = if token_in < token_out {
        Direction::ZeroForOne
    } else {
        Direction::OneForZero
    };
    Swap::new(
        SwapId {
            pool_id: pool_id(pool_label),
            direction,
        },
        token_id(token_in),
        token_id(token_out),
    )
    .unwrap()
}

/// Snapshot over the given pools, registering every token they mention
#[allow(dead_code)]
pub fn snapshot_of(pools: Vec<Pool>) -> RegistrySnapshot {
    let mut ids: Vec<TokenId> = pools.iter().flat_map(|p| [p.token0, p.token1]).collect();
    ids.sort();
    ids.dedup();
    let tokens = ids
        .into_iter()
        .map(|id| {
            let label = String::from_utf8_lossy(id.address().as_slice())
                .trim_start_matches('\0')
                .to_string();
            Token::new(id, label, 18)
        })
        .collect();
    RegistrySnapshot::new(1, tokens, pools).unwrap()
}

#[allow(dead_code)]
pub fn snapshot(pool_args: &[(&str, &str, &str, u128, u128)]) -> RegistrySnapshot {
    snapshot_of(
        pool_args
            .iter()
            .map(|(id, token0, token1, reserve0, reserve1)| {
                pool(id, token0, token1, *reserve0, *reserve1)
            })
            .collect(),
    )
}

/// Route through the labelled pools starting from `base`
#[allow(dead_code)]
pub fn route(pools: &impl PoolLookup, pool_labels: &[&str], base: &str) -> Route {
    let mut token_in = token_id(base);
    let swaps = pool_labels
        .iter()
        .map(|label| {
            let pool = pools.pool(&pool_id(label)).unwrap();
            let swap = match pool.direction_for(token_in).unwrap() {
                Direction::ZeroForOne => Swap::forward(pool),
                Direction::OneForZero => Swap::reverse(pool),
            };
            token_in = swap.token_out();
            swap
        })
        .collect();
    Route::new(swaps).unwrap()
}
