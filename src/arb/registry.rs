//! # Pool Registry
//!
//! Immutable snapshots of every known token and pool, indexed by pair and
//! ranked by liquidity. A refresh builds a whole new [`RegistrySnapshot`] and
//! publishes it with a single pointer swap; readers holding the previous
//! `Arc` keep a consistent view until they drop it.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use derive_more::{Display, Error};
use log::{debug, info, warn};

use super::pool::{Pool, PoolLookup};
use super::route::Route;
use super::token::Token;
use super::types::{PoolId, TokenId};
use crate::sync::ReserveSource;

/// Why no usable snapshot could be produced.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum RegistryError {
    /// The reserve source failed or nothing was published yet
    #[display("registry unavailable: {reason}")]
    Unavailable {
        /// What went wrong upstream
        reason: String,
    },
    /// The latest snapshot is older than the configured policy allows
    #[display("registry snapshot is {age_secs}s old (max {max_age_secs}s)")]
    Stale {
        /// Snapshot age
        age_secs: u64,
        /// Allowed age
        max_age_secs: u64,
    },
    /// The snapshot contains no tradable pool
    #[display("registry snapshot has no tradable pools")]
    Empty,
    /// A pool references unknown tokens or trades a token against itself
    #[display("invalid pool {pool}: {reason}")]
    InvalidPool {
        /// The offending pool
        pool: PoolId,
        /// What is wrong with it
        reason: String,
    },
}

/// Key of the pair index: the two tokens in address order
fn pair_key(a: TokenId, b: TokenId) -> (TokenId, TokenId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// A self-consistent view of all pools as of one block.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    block_number: u64,
    fetched_at: DateTime<Utc>,
    tokens: BTreeMap<TokenId, Token>,
    pools: BTreeMap<PoolId, Pool>,
    /// Pools of every pair, best liquidity first
    pairs: BTreeMap<(TokenId, TokenId), Vec<PoolId>>,
}

impl RegistrySnapshot {
    /// Builds and validates a snapshot.
    ///
    /// Pool decimals are taken from the token list. Pools with an empty side
    /// cannot be priced and are left out with a warning.
    ///
    /// # Errors
    ///
    /// `InvalidPool` for a pool over unknown or identical tokens, `Empty` when
    /// no pool survives.
    pub fn new(
        block_number: u64,
        tokens: Vec<Token>,
        pools: Vec<Pool>,
    ) -> Result<Self, RegistryError> {
        let tokens: BTreeMap<TokenId, Token> =
            tokens.into_iter().map(|token| (token.id, token)).collect();

        let mut by_id = BTreeMap::new();
        for pool in pools {
            if pool.token0 == pool.token1 {
                return Err(RegistryError::InvalidPool {
                    pool: pool.id,
                    reason: "token0 and token1 are the same".to_string(),
                });
            }
            let (Some(token0), Some(token1)) = (tokens.get(&pool.token0), tokens.get(&pool.token1))
            else {
                return Err(RegistryError::InvalidPool {
                    pool: pool.id,
                    reason: "unknown token".to_string(),
                });
            };
            if pool.reserve0.is_zero() || pool.reserve1.is_zero() {
                warn!("registry: skipping pool {} with an empty reserve", pool.id);
                continue;
            }
            let pool = pool.with_decimals(token0.decimals, token1.decimals);
            by_id.insert(pool.id, pool);
        }
        if by_id.is_empty() {
            return Err(RegistryError::Empty);
        }

        let mut pairs: BTreeMap<(TokenId, TokenId), Vec<PoolId>> = BTreeMap::new();
        for pool in by_id.values() {
            pairs
                .entry(pair_key(pool.token0, pool.token1))
                .or_default()
                .push(pool.id);
        }
        for ((low, _), ranked) in &mut pairs {
            ranked.sort_by_key(|id| {
                let pool = &by_id[id];
                (
                    Reverse(pool.reserve_of(*low).unwrap_or_default()),
                    pool.fee_bps,
                    pool.id,
                )
            });
        }

        debug!(
            "registry: snapshot at block {} with {} tokens, {} pools, {} pairs",
            block_number,
            tokens.len(),
            by_id.len(),
            pairs.len()
        );

        Ok(Self {
            block_number,
            fetched_at: Utc::now(),
            tokens,
            pools: by_id,
            pairs,
        })
    }

    /// Overrides the fetch time, for snapshots loaded from disk
    #[must_use]
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// Block the reserves were read at
    #[must_use]
    pub const fn block_number(&self) -> u64 {
        self.block_number
    }

    /// When the reserves were read
    #[must_use]
    pub const fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    /// Time elapsed since the reserves were read
    #[must_use]
    pub fn age(&self) -> Duration {
        (Utc::now() - self.fetched_at).to_std().unwrap_or_default()
    }

    /// Token by address
    #[must_use]
    pub fn token(&self, id: &TokenId) -> Option<&Token> {
        self.tokens.get(id)
    }

    /// Token by ticker symbol, case-insensitive
    #[must_use]
    pub fn token_by_symbol(&self, symbol: &str) -> Option<&Token> {
        self.tokens
            .values()
            .find(|token| token.symbol.eq_ignore_ascii_case(symbol))
    }

    /// All tokens, in address order
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    /// All pools, in address order
    pub fn pools(&self) -> impl Iterator<Item = &Pool> {
        self.pools.values()
    }

    /// Pools trading the pair, best liquidity first
    #[must_use]
    pub fn pools_for_pair(&self, a: TokenId, b: TokenId) -> Vec<&Pool> {
        self.pairs
            .get(&pair_key(a, b))
            .map(|ids| ids.iter().filter_map(|id| self.pools.get(id)).collect())
            .unwrap_or_default()
    }

    /// The best-liquidity pool of the pair.
    ///
    /// Pools are ranked by their reserve of the lower-address token, then by
    /// lower fee, then by lower pool address.
    #[must_use]
    pub fn best_pool(&self, a: TokenId, b: TokenId) -> Option<&Pool> {
        self.pools_for_pair(a, b).into_iter().next()
    }

    /// Every pair with its ranked pools, in address order
    pub fn pairs(&self) -> impl Iterator<Item = ((TokenId, TokenId), Vec<&Pool>)> {
        self.pairs.iter().map(|(pair, ids)| {
            (
                *pair,
                ids.iter().filter_map(|id| self.pools.get(id)).collect(),
            )
        })
    }

    /// Symbols of the route's token sequence. Unknown tokens show their address.
    #[must_use]
    pub fn route_symbols(&self, route: &Route) -> Vec<String> {
        route
            .tokens()
            .iter()
            .map(|id| {
                self.token(id)
                    .map_or_else(|| id.to_string(), |token| token.symbol.clone())
            })
            .collect()
    }
}

impl PoolLookup for RegistrySnapshot {
    fn pool(&self, id: &PoolId) -> Option<&Pool> {
        self.pools.get(id)
    }
}

/// Holder of the latest published snapshot.
#[derive(Debug, Default)]
pub struct PoolRegistry {
    current: ArcSwapOption<RegistrySnapshot>,
}

impl PoolRegistry {
    /// A registry with nothing published yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a snapshot, replacing the previous one atomically
    pub fn publish(&self, snapshot: RegistrySnapshot) -> Arc<RegistrySnapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Some(Arc::clone(&snapshot)));
        snapshot
    }

    /// The latest snapshot, if any
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<RegistrySnapshot>> {
        self.current.load_full()
    }

    /// The latest snapshot if it is younger than `max_age`.
    ///
    /// # Errors
    ///
    /// `Unavailable` before the first publish, `Stale` past the age policy.
    pub fn fresh_snapshot(&self, max_age: Duration) -> Result<Arc<RegistrySnapshot>, RegistryError> {
        let snapshot = self.snapshot().ok_or_else(|| RegistryError::Unavailable {
            reason: "no snapshot published".to_string(),
        })?;
        let age = snapshot.age();
        if age > max_age {
            return Err(RegistryError::Stale {
                age_secs: age.as_secs(),
                max_age_secs: max_age.as_secs(),
            });
        }
        Ok(snapshot)
    }

    /// Fetches a new snapshot from `source` and publishes it.
    ///
    /// # Errors
    ///
    /// `Unavailable` when the source fails. The previous snapshot stays published.
    pub async fn refresh<S: ReserveSource>(
        &self,
        source: &S,
    ) -> Result<Arc<RegistrySnapshot>, RegistryError> {
        let snapshot = source.fetch().await.map_err(|e| {
            warn!("registry: refresh failed: {e:#}");
            RegistryError::Unavailable {
                reason: e.to_string(),
            }
        })?;
        info!(
            "registry: published block {} ({} pools)",
            snapshot.block_number(),
            snapshot.pools.len()
        );
        Ok(self.publish(snapshot))
    }
}
