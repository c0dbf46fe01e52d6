//! The watch loop: refresh the registry, run a pipeline cycle, publish what
//! it found, optionally execute the best opportunity, sleep, repeat.

use std::time::Duration;

use alloy::providers::Provider;
use eyre::Result;
use log::{error, info, warn};

use crate::arb::pipeline::{CycleReport, Pipeline};
use crate::arb::registry::PoolRegistry;
use crate::execution::Submitter;
use crate::feed::{JsonlWriter, OpportunityRecord};
use crate::guard::ExecutionRequest;
use crate::notify::SlackNotifier;
use crate::sync::ReserveSource;

/// Runs pipeline cycles against a reserve source.
#[derive(Debug)]
pub struct Bot<S> {
    source: S,
    registry: PoolRegistry,
    pipeline: Pipeline,
    feed: Option<JsonlWriter>,
    notifier: Option<SlackNotifier>,
}

impl<S: ReserveSource> Bot<S> {
    /// Bot reading from `source`
    pub fn new(source: S, pipeline: Pipeline) -> Self {
        Self {
            source,
            registry: PoolRegistry::new(),
            pipeline,
            feed: None,
            notifier: None,
        }
    }

    /// Appends every opportunity to `feed`
    #[must_use]
    pub fn with_feed(mut self, feed: JsonlWriter) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Posts cycle results to Slack
    #[must_use]
    pub fn with_notifier(mut self, notifier: Option<SlackNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Registry the bot publishes to
    #[must_use]
    pub const fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    /// One cycle at the given gas price. Returns `None` when the cycle was
    /// skipped; the reason is logged.
    pub async fn cycle(&mut self, gas_price_wei: u128) -> Option<CycleReport> {
        if let Err(e) = self.registry.refresh(&self.source).await {
            warn!("bot: keeping previous snapshot: {e}");
        }
        let report = match self.pipeline.run_cycle(&self.registry, gas_price_wei).await {
            Ok(report) => report,
            Err(e) => {
                warn!("bot: skipping cycle: {e}");
                return None;
            }
        };

        if let Some(feed) = &mut self.feed {
            let records: Vec<OpportunityRecord> =
                report.opportunities.iter().map(OpportunityRecord::from).collect();
            if let Err(e) = feed.append_all(&records) {
                error!("bot: feed write failed: {e:#}");
            }
        }
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.send_opportunities(&report.opportunities).await {
                warn!("bot: slack notification failed: {e}");
            }
        }
        Some(report)
    }

    /// Cycles every `interval` until Ctrl-C. Gas prices come from
    /// `provider`; with a submitter the best opportunity of each cycle is
    /// sent on chain.
    ///
    /// # Errors
    ///
    /// Only if the Ctrl-C handler cannot be installed. Failed cycles are
    /// logged and skipped.
    pub async fn watch<P: Provider, Q: Provider>(
        &mut self,
        provider: &P,
        submitter: Option<&Submitter<Q>>,
        interval: Duration,
        slippage_bps: u32,
    ) -> Result<()> {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        info!("bot: watching every {interval:?}");
        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    signal?;
                    info!("bot: received shutdown signal");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }

            let gas_price_wei = match provider.get_gas_price().await {
                Ok(price) => price,
                Err(e) => {
                    warn!("bot: skipping cycle, no gas price: {e}");
                    continue;
                }
            };
            let Some(report) = self.cycle(gas_price_wei).await else {
                continue;
            };

            let (Some(submitter), Some(best)) = (submitter, report.opportunities.first()) else {
                continue;
            };
            let request = ExecutionRequest::from_opportunity(best, slippage_bps);
            match submitter.execute(&request).await {
                Ok(receipt) => info!(
                    "bot: executed {} in tx {}",
                    best.route, receipt.transaction_hash
                ),
                Err(e) => {
                    error!("bot: execution of {} failed: {e:#}", best.route);
                    if let Some(notifier) = &self.notifier {
                        if let Err(e) = notifier.send_error(&format!("{e:#}")).await {
                            warn!("bot: slack notification failed: {e}");
                        }
                    }
                }
            }
        }
    }
}
