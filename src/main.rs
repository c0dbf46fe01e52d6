use std::path::PathBuf;
use std::sync::Arc;

use alloy::providers::RootProvider;
use clap::{Parser, Subcommand};
use eyre::{Error, Result};
use log::{info, warn};

use flashroute::arb::pipeline::CycleReport;
use flashroute::bot::Bot;
use flashroute::execution::Submitter;
use flashroute::feed::{JsonlWriter, OpportunityRecord, ReceiptRecord};
use flashroute::notify::SlackNotifier;
use flashroute::rehearse::{Rehearsal, RehearsalConfig};
use flashroute::sync::{Catalog, RpcReserveSource};
use flashroute::utils::app_context::AppContext;
use flashroute::utils::constants::{CONFIRMATION_TIMEOUT, GWEI};
use flashroute::utils::logger::setup_logger;
use flashroute::utils::providers::{http_provider, signing_provider};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one cycle on a snapshot file and append the opportunities to the feed
    Scan {
        /// Catalog with reserves; defaults to FLASHROUTE_CATALOG
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Gas price used for scoring
        #[arg(long, default_value_t = 20)]
        gas_price_gwei: u64,
    },
    /// Refresh reserves over RPC and run a cycle every interval
    Watch,
    /// Run a snapshot's opportunities through an in-memory executor
    Rehearse {
        /// Catalog with reserves; defaults to FLASHROUTE_CATALOG
        #[arg(long)]
        snapshot: Option<PathBuf>,
        /// Network gas price of the rehearsal chain
        #[arg(long, default_value_t = 20)]
        gas_price_gwei: u64,
        /// Executor gas price ceiling
        #[arg(long, default_value_t = 50)]
        max_gas_price_gwei: u64,
        /// Flash lender premium
        #[arg(long, default_value_t = 5)]
        flash_loan_fee_bps: u32,
    },
    /// Send slack message
    Slack { message: String },
    /// Send slack error message
    SlackError { message: String },
}

fn print_report(report: &CycleReport) {
    println!(
        "\nBlock {}: {} routes, {} profitable, {} opportunities ({:?})",
        report.block_number,
        report.routes,
        report.profitable,
        report.opportunities.len(),
        report.elapsed
    );
    for opportunity in &report.opportunities {
        println!(
            "  {:<40} {:>6} bps  in {:<28} {:<15} gas {}",
            opportunity.symbols.join(" -> "),
            opportunity.profit_bps,
            opportunity.amount_in.to_string(),
            opportunity.strategy.to_string(),
            opportunity.gas_estimate
        );
    }
}

async fn scan_cycle(ctx: &AppContext, snapshot: Option<PathBuf>, gas_price_gwei: u64) -> Result<CycleReport, Error> {
    let path = snapshot.unwrap_or_else(|| ctx.config.catalog.clone());
    let snapshot = Catalog::from_file(&path)?.snapshot()?;
    let report = ctx
        .pipeline()?
        .run_on(Arc::new(snapshot), u128::from(gas_price_gwei) * GWEI)
        .await;
    print_report(&report);
    Ok(report)
}

async fn scan(ctx: &AppContext, snapshot: Option<PathBuf>, gas_price_gwei: u64) -> Result<(), Error> {
    let report = scan_cycle(ctx, snapshot, gas_price_gwei).await?;
    let records: Vec<OpportunityRecord> = report.opportunities.iter().map(OpportunityRecord::from).collect();
    let written = JsonlWriter::open(&ctx.config.feed)?.append_all(&records)?;
    info!("scan: appended {written} opportunities to {}", ctx.config.feed.display());
    if let Some(notifier) = &ctx.notifier {
        if let Err(e) = notifier.send_opportunities(&report.opportunities).await {
            warn!("scan: slack notification failed: {e}");
        }
    }
    Ok(())
}

async fn watch(ctx: AppContext) -> Result<(), Error> {
    let url = ctx.config.require_rpc_url()?;
    let provider = http_provider(url.clone());
    let source = RpcReserveSource::new(provider.clone(), ctx.catalog()?);
    let mut bot = Bot::new(source, ctx.pipeline()?)
        .with_feed(JsonlWriter::open(&ctx.config.feed)?)
        .with_notifier(ctx.notifier.clone());
    let interval = ctx.config.interval;
    let slippage_bps = ctx.config.slippage_bps;

    match (&ctx.config.private_key, ctx.config.executor_address) {
        (Some(key), Some(executor)) => {
            info!("watch: executing through {executor}");
            let submitter = Submitter::new(signing_provider(url, key)?, executor, CONFIRMATION_TIMEOUT);
            bot.watch(&provider, Some(&submitter), interval, slippage_bps).await
        }
        _ => {
            info!("watch: no executor key or address, reporting only");
            bot.watch(&provider, None::<&Submitter<RootProvider>>, interval, slippage_bps)
                .await
        }
    }
}

async fn rehearse(
    ctx: &AppContext,
    snapshot: Option<PathBuf>,
    config: RehearsalConfig,
) -> Result<(), Error> {
    let path = snapshot.unwrap_or_else(|| ctx.config.catalog.clone());
    let registry_snapshot = Catalog::from_file(&path)?.snapshot()?;
    let report = ctx
        .pipeline()?
        .run_on(Arc::new(registry_snapshot.clone()), config.gas_price_wei)
        .await;
    print_report(&report);

    let mut rehearsal = Rehearsal::new(&registry_snapshot, &config)?;
    let receipts = rehearsal.execute_all(&report.opportunities);

    let mut log = JsonlWriter::open(&ctx.config.receipts)?;
    for receipt in &receipts {
        log.append(&ReceiptRecord::from(receipt))?;
        let trail: Vec<String> = receipt.trail.iter().map(ToString::to_string).collect();
        println!(
            "  {:<10} profit {:<28} gas {:<8} {}{}",
            receipt.final_state.to_string(),
            receipt.actual_profit.to_string(),
            receipt.gas_used,
            trail.join(" -> "),
            receipt
                .revert_reason
                .as_ref()
                .map(|reason| format!(" ({reason})"))
                .unwrap_or_default()
        );
        for hop in &receipt.hops {
            println!(
                "    {:<52} {} -> {}",
                hop.swap.id().to_string(),
                hop.amount_in,
                hop.amount_out
            );
        }
        if let Some(notifier) = &ctx.notifier {
            notifier.send_receipt(receipt).await?;
        }
    }
    let settled = receipts.iter().filter(|r| r.is_settled()).count();
    ctx.notify(&format!(
        "Rehearsal of block {}: {settled}/{} settled",
        report.block_number,
        receipts.len()
    ))
    .await;
    Ok(())
}

async fn send_slack_message(message: &str) -> Result<(), Error> {
    let notifier = SlackNotifier::from_env()?;
    notifier.send(message).await?;
    Ok(())
}

async fn send_slack_error_message(message: &str) -> Result<(), Error> {
    let notifier = SlackNotifier::from_env()?;
    notifier.send_error(message).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    setup_logger()?;
    let cli = Cli::parse();
    let ctx = AppContext::new()?;

    match cli.command {
        Commands::Scan {
            snapshot,
            gas_price_gwei,
        } => scan(&ctx, snapshot, gas_price_gwei).await?,
        Commands::Watch => watch(ctx).await?,
        Commands::Rehearse {
            snapshot,
            gas_price_gwei,
            max_gas_price_gwei,
            flash_loan_fee_bps,
        } => {
            let config = RehearsalConfig {
                gas_price_wei: u128::from(gas_price_gwei) * GWEI,
                max_gas_price_wei: u128::from(max_gas_price_gwei) * GWEI,
                flash_loan_fee_bps,
                slippage_bps: ctx.config.slippage_bps,
                ..RehearsalConfig::default()
            };
            rehearse(&ctx, snapshot, config).await?;
        }
        Commands::Slack { message } => send_slack_message(&message).await?,
        Commands::SlackError { message } => send_slack_error_message(&message).await?,
    }

    Ok(())
}
