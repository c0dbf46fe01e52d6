use alloy::primitives::U256;

use crate::arb::math::BPS;
use crate::arb::rank::{Opportunity, Strategy};
use crate::arb::route::Route;
use crate::arb::route_quote::HopQuote;

use super::state::{GuardState, RevertReason};

/// Arguments of one `executeRoute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Hops to execute, starting and ending at the base token
    pub route: Route,
    /// Where the input comes from
    pub strategy: Strategy,
    /// Base-token input
    pub amount_in: U256,
    /// The execution reverts if the live re-quote is below this
    pub min_amount_out: U256,
}

impl ExecutionRequest {
    /// Request for an opportunity, tolerating `slippage_bps` below its
    /// expected output.
    #[must_use]
    pub fn from_opportunity(opportunity: &Opportunity, slippage_bps: u32) -> Self {
        let keep = U256::from(BPS.saturating_sub(slippage_bps));
        Self {
            route: opportunity.route.clone(),
            strategy: opportunity.strategy,
            amount_in: opportunity.amount_in,
            min_amount_out: opportunity.expected_amount_out.saturating_mul(keep) / U256::from(BPS),
        }
    }
}

/// What one execution did. Produced for settled and reverted runs alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionReceipt {
    /// Key of the executed route
    pub route: String,
    /// Strategy the request asked for
    pub strategy: Strategy,
    /// Base-token input
    pub amount_in: U256,
    /// Base-token amount sent to the treasury, zero when reverted
    pub actual_profit: U256,
    /// Gas units charged to the caller
    pub gas_used: u64,
    /// `gas_used` times the gas price, in wei
    pub gas_fee_wei: U256,
    /// `Settled` or `Reverted`
    pub final_state: GuardState,
    /// Set when reverted
    pub revert_reason: Option<RevertReason>,
    /// Every state entered, in order
    pub trail: Vec<GuardState>,
    /// Amounts of every hop swapped before the run ended. A reverted run's
    /// swaps are rolled back but still listed here.
    pub hops: Vec<HopQuote>,
}

impl ExecutionReceipt {
    /// Whether the run settled
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.final_state == GuardState::Settled
    }
}
