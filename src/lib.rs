/*!
 * # flashroute - multi-hop DEX arbitrage
 *
 * Finds token cycles across DEX pools whose output beats their input, prices
 * them under each pool's invariant, ranks them net of gas, and executes them
 * atomically with a flash loan or the executor's own capital.
 *
 * ## Module Structure
 *
 * - `arb`: math, registry, route generation, simulation, ranking, pipeline
 * - `guard`: the executor contract as a transactional state machine
 * - `execution`: calldata and submission for the deployed executor
 * - `sync`: reserve sources feeding the registry
 * - `feed`: JSON Lines output of opportunities and receipts
 * - `rehearse`: dry runs of opportunities through the guard
 * - `bot`: the watch loop
 */

/// Arbitrage detection: math, registry, routes, simulation, ranking
pub mod arb;
/// Watch loop
pub mod bot;
/// Environment configuration
pub mod config;
/// Executor contract calldata and submission
pub mod execution;
/// Opportunity and receipt feeds
pub mod feed;
/// Execution guard state machine
pub mod guard;
/// Slack notifications
pub mod notify;
/// Dry runs through the execution guard
pub mod rehearse;
/// Reserve sources
pub mod sync;
/// Utility functions and helpers
pub mod utils;
