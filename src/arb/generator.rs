//! # Route Generator
//!
//! Enumerates every cycle of 2..=`max_depth` hops that starts and ends at a
//! configured base token. The graph has one directed edge per pool side; a
//! pair contributes at most `max_pools_per_pair` pools, best liquidity first.
//!
//! Traversal is a depth-first search driven by an explicit stack, so the hop
//! bound is the only bound on memory. Adjacency lists are sorted, which makes
//! the output order reproducible for a given snapshot.

use std::collections::BTreeMap;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::registry::RegistrySnapshot;
use super::route::Route;
use super::swap::Swap;
use super::types::TokenId;

/// Route generation parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Tokens routes start from: ticker symbols or addresses
    pub base_tokens: Vec<String>,
    /// Maximum number of hops of a route
    pub max_depth: usize,
    /// How many pools of a pair become edges, best liquidity first
    pub max_pools_per_pair: usize,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            base_tokens: vec!["WETH".to_string()],
            max_depth: 3,
            max_pools_per_pair: 1,
        }
    }
}

/// Walk state of one token on the current path
struct Frame {
    token: TokenId,
    next_edge: usize,
}

/// Enumerates candidate routes from a snapshot.
#[derive(Debug, Clone)]
pub struct RouteGenerator {
    config: RouteConfig,
}

impl RouteGenerator {
    /// Creates a generator
    #[must_use]
    pub const fn new(config: RouteConfig) -> Self {
        Self { config }
    }

    /// Outgoing swaps of every token, sorted by destination then pool
    fn adjacency(&self, snapshot: &RegistrySnapshot) -> BTreeMap<TokenId, Vec<Swap>> {
        let mut adjacency: BTreeMap<TokenId, Vec<Swap>> = BTreeMap::new();
        for (_, ranked) in snapshot.pairs() {
            for pool in ranked.into_iter().take(self.config.max_pools_per_pair) {
                adjacency
                    .entry(pool.token0)
                    .or_default()
                    .push(Swap::forward(pool));
                adjacency
                    .entry(pool.token1)
                    .or_default()
                    .push(Swap::reverse(pool));
            }
        }
        for edges in adjacency.values_mut() {
            edges.sort_by_key(|swap| (swap.token_out(), swap.pool_id()));
        }
        adjacency
    }

    fn resolve_base(snapshot: &RegistrySnapshot, entry: &str) -> Option<TokenId> {
        if let Ok(id) = TokenId::from_str(entry) {
            return snapshot.token(&id).map(|token| token.id);
        }
        snapshot.token_by_symbol(entry).map(|token| token.id)
    }

    /// Every route of the snapshot, base tokens in configured order.
    #[must_use]
    pub fn generate(&self, snapshot: &RegistrySnapshot) -> Vec<Route> {
        let adjacency = self.adjacency(snapshot);
        let mut routes = Vec::new();
        for entry in &self.config.base_tokens {
            let Some(base) = Self::resolve_base(snapshot, entry) else {
                warn!("generator: base token {entry} is not in the registry");
                continue;
            };
            let found = self.cycles_from(base, &adjacency);
            debug!("generator: {} routes from {entry}", found.len());
            routes.extend(found);
        }
        routes
    }

    fn cycles_from(&self, base: TokenId, adjacency: &BTreeMap<TokenId, Vec<Swap>>) -> Vec<Route> {
        let max_depth = self.config.max_depth;
        let mut routes = Vec::new();
        if max_depth < 2 {
            return routes;
        }

        let mut path: Vec<Swap> = Vec::with_capacity(max_depth);
        let mut stack = vec![Frame {
            token: base,
            next_edge: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let edges = adjacency.get(&frame.token).map_or(&[][..], Vec::as_slice);
            let Some(swap) = edges.get(frame.next_edge).copied() else {
                stack.pop();
                path.pop();
                continue;
            };
            frame.next_edge += 1;

            if path.iter().any(|hop| hop.pool_id() == swap.pool_id()) {
                continue;
            }

            if swap.token_out() == base {
                if !path.is_empty() {
                    let mut swaps = path.clone();
                    swaps.push(swap);
                    match Route::new(swaps) {
                        Ok(route) => routes.push(route),
                        Err(e) => debug!("generator: dropped cycle: {e}"),
                    }
                }
                continue;
            }

            // One more hop is still needed to close the cycle
            if path.len() + 2 > max_depth {
                continue;
            }
            if path.iter().any(|hop| hop.token_out() == swap.token_out()) {
                continue;
            }

            path.push(swap);
            stack.push(Frame {
                token: swap.token_out(),
                next_edge: 0,
            });
        }
        routes
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::arb::test_helpers::*;

    fn k4() -> RegistrySnapshot {
        snapshot(&[
            ("P1", "A", "B", 1_000, 1_000),
            ("P2", "A", "C", 1_000, 1_000),
            ("P3", "A", "D", 1_000, 1_000),
            ("P4", "B", "C", 1_000, 1_000),
            ("P5", "B", "D", 1_000, 1_000),
            ("P6", "C", "D", 1_000, 1_000),
        ])
    }

    fn generator(max_depth: usize, max_pools_per_pair: usize) -> RouteGenerator {
        RouteGenerator::new(RouteConfig {
            base_tokens: vec!["A".to_string()],
            max_depth,
            max_pools_per_pair,
        })
    }

    #[test]
    fn test_four_token_graph_depth_three() {
        let routes = generator(3, 1).generate(&k4());
        // Ordered pairs of distinct tokens from {B, C, D}
        assert_eq!(routes.len(), 6);
        assert!(routes.iter().all(|r| r.hop_count() == 3));
        assert!(routes.iter().all(|r| r.base() == token_id("A")));
    }

    #[test]
    fn test_four_token_graph_depth_four() {
        let routes = generator(4, 1).generate(&k4());
        // 6 triangles plus 3! orderings of {B, C, D}
        assert_eq!(routes.len(), 12);
        assert_eq!(routes.iter().filter(|r| r.hop_count() == 4).count(), 6);
    }

    #[test]
    fn test_parallel_pools() {
        let market = snapshot(&[
            ("P1", "A", "B", 1_000, 1_000),
            ("P7", "A", "B", 900, 900),
            ("P2", "A", "C", 1_000, 1_000),
            ("P3", "A", "D", 1_000, 1_000),
            ("P4", "B", "C", 1_000, 1_000),
            ("P5", "B", "D", 1_000, 1_000),
            ("P6", "C", "D", 1_000, 1_000),
        ]);
        let routes = generator(3, 2).generate(&market);
        assert_eq!(routes.iter().filter(|r| r.hop_count() == 2).count(), 2);
        assert_eq!(routes.iter().filter(|r| r.hop_count() == 3).count(), 10);

        // Only the best A/B pool when capped at one per pair
        let routes = generator(3, 1).generate(&market);
        assert_eq!(routes.len(), 6);
        assert!(routes
            .iter()
            .flat_map(|r| r.swaps().iter())
            .all(|s| s.pool_id() != pool_id("P7")));
    }

    #[test]
    fn test_no_repeated_edges_or_tokens() {
        let routes = generator(4, 1).generate(&k4());
        for route in &routes {
            let edges: HashSet<_> = route.swaps().iter().map(Swap::id).collect();
            assert_eq!(edges.len(), route.hop_count());
            let tokens = route.tokens();
            assert_eq!(tokens.first(), tokens.last());
            let inner: HashSet<_> = tokens[..tokens.len() - 1].iter().collect();
            assert_eq!(inner.len(), route.hop_count());
        }
    }

    #[test]
    fn test_deterministic_order() {
        let market = k4();
        let first = generator(4, 1).generate(&market);
        let second = generator(4, 1).generate(&market);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_base_and_shallow_depth() {
        let market = k4();
        let routes = RouteGenerator::new(RouteConfig {
            base_tokens: vec!["ZZZ".to_string()],
            max_depth: 3,
            max_pools_per_pair: 1,
        })
        .generate(&market);
        assert!(routes.is_empty());
        assert!(generator(1, 1).generate(&market).is_empty());
    }
}
