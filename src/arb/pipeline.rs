//! # Opportunity Pipeline
//!
//! One cycle: take a fresh snapshot, generate routes, simulate them on
//! blocking workers in chunks that share the snapshot, then rank.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::{Result, WrapErr};
use futures::future::join_all;
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use super::generator::{RouteConfig, RouteGenerator};
use super::rank::{Opportunity, Ranker, RankerConfig};
use super::registry::{PoolRegistry, RegistryError, RegistrySnapshot};
use super::simulate::{Simulator, SimulatorConfig};

/// Parameters of every pipeline stage, loadable from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Route generation
    pub routes: RouteConfig,
    /// Ladder sweep
    pub simulator: SimulatorConfig,
    /// Filtering and scoring
    pub ranker: RankerConfig,
    /// Routes per blocking worker task
    pub chunk_size: usize,
    /// Snapshots older than this are not simulated
    pub max_snapshot_age_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            routes: RouteConfig::default(),
            simulator: SimulatorConfig::default(),
            ranker: RankerConfig::default(),
            chunk_size: 64,
            max_snapshot_age_secs: 30,
        }
    }
}

impl PipelineConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Unreadable file or invalid JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading pipeline config {}", path.display()))?;
        serde_json::from_str(&raw)
            .wrap_err_with(|| format!("parsing pipeline config {}", path.display()))
    }
}

/// Outcome of one pipeline cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Block of the snapshot used
    pub block_number: u64,
    /// Routes generated
    pub routes: usize,
    /// Routes with a profitable ladder point
    pub profitable: usize,
    /// Ranked opportunities, best first
    pub opportunities: Vec<Opportunity>,
    /// Wall time of the cycle
    pub elapsed: Duration,
}

/// The off-chain stages wired together.
#[derive(Debug, Clone)]
pub struct Pipeline {
    generator: RouteGenerator,
    simulator: Arc<Simulator>,
    ranker: Ranker,
    chunk_size: usize,
    max_snapshot_age: Duration,
}

impl Pipeline {
    /// Builds every stage from the config.
    ///
    /// # Errors
    ///
    /// Invalid ranker prices.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Ok(Self {
            generator: RouteGenerator::new(config.routes),
            simulator: Arc::new(Simulator::new(config.simulator)),
            ranker: Ranker::new(config.ranker)?,
            chunk_size: config.chunk_size.max(1),
            max_snapshot_age: Duration::from_secs(config.max_snapshot_age_secs),
        })
    }

    /// Runs a cycle on the registry's latest snapshot.
    ///
    /// # Errors
    ///
    /// No snapshot or a stale one. The caller skips this cycle.
    pub async fn run_cycle(
        &self,
        registry: &PoolRegistry,
        gas_price_wei: u128,
    ) -> Result<CycleReport, RegistryError> {
        let snapshot = registry.fresh_snapshot(self.max_snapshot_age)?;
        Ok(self.run_on(snapshot, gas_price_wei).await)
    }

    /// Runs a cycle on the given snapshot.
    pub async fn run_on(&self, snapshot: Arc<RegistrySnapshot>, gas_price_wei: u128) -> CycleReport {
        let started = Instant::now();
        let routes = self.generator.generate(&snapshot);
        let route_count = routes.len();
        debug!(
            "pipeline: {route_count} routes at block {}",
            snapshot.block_number()
        );

        let tasks = routes
            .chunks(self.chunk_size)
            .map(|chunk| {
                let chunk = chunk.to_vec();
                let simulator = Arc::clone(&self.simulator);
                let snapshot = Arc::clone(&snapshot);
                tokio::task::spawn_blocking(move || simulator.simulate_all(&chunk, &*snapshot))
            })
            .collect::<Vec<_>>();

        let mut results = Vec::new();
        for joined in join_all(tasks).await {
            match joined {
                Ok(chunk) => results.extend(chunk),
                Err(e) => error!("pipeline: simulation worker failed: {e}"),
            }
        }
        let profitable = results.len();

        let opportunities = self.ranker.rank(results, &snapshot, gas_price_wei);
        let elapsed = started.elapsed();
        info!(
            "pipeline: block {} routes {} profitable {} opportunities {} in {:?}",
            snapshot.block_number(),
            route_count,
            profitable,
            opportunities.len(),
            elapsed
        );

        CycleReport {
            block_number: snapshot.block_number(),
            routes: route_count,
            profitable,
            opportunities,
            elapsed,
        }
    }
}
