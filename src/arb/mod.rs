//! # Arbitrage Module
//!
//! Off-chain half of the system: pool math, the registry, route generation,
//! simulation and ranking, wired together by the pipeline.

/// Candidate cycle enumeration
pub mod generator;
/// Integer pool math
pub mod math;
/// Registry snapshot to ranked opportunities
pub mod pipeline;
/// Pool data structures and operations
pub mod pool;
/// Opportunity filtering, strategy and scoring
pub mod rank;
/// Published pool snapshots
pub mod registry;
/// Cycles of swaps
pub mod route;
/// Per-hop quotes of a route
pub mod route_quote;
/// Input ladder sweeps
pub mod simulate;
/// Swap execution and modeling
pub mod swap;
/// Test helpers and utilities
#[cfg(test)]
pub(crate) mod test_helpers;
/// Token data structures and utilities
pub mod token;
/// Common type definitions
pub mod types;
