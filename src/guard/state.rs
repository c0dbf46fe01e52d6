use std::fmt::{self, Display};

use alloy::primitives::{Address, U256};
use derive_more::{Display as DeriveDisplay, Error};
use serde::{Deserialize, Serialize};

use crate::arb::types::PoolId;

use super::access::Role;

/// Steps of one execution. The chain never persists anything but the final
/// state: a revert undoes every step before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    /// Preconditions are being checked
    Idle,
    /// The input is being borrowed from the flash lender
    Borrowing,
    /// Hops are being executed against live pools
    Swapping,
    /// Principal and fee are being returned
    Repaying,
    /// Profit went to the treasury. Terminal.
    Settled,
    /// Everything was rolled back. Terminal.
    Reverted,
}

impl GuardState {
    /// Whether no further transition is possible
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Settled | Self::Reverted)
    }
}

impl Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "Idle",
            Self::Borrowing => "Borrowing",
            Self::Swapping => "Swapping",
            Self::Repaying => "Repaying",
            Self::Settled => "Settled",
            Self::Reverted => "Reverted",
        };
        write!(f, "{name}")
    }
}

/// Why the guard reverted a transaction.
#[derive(Debug, Clone, PartialEq, Eq, DeriveDisplay, Error)]
pub enum RevertReason {
    /// The caller lacks the role the operation requires
    #[display("{account} is missing role {role}")]
    Unauthorized {
        /// Caller
        account: Address,
        /// Role required
        role: Role,
    },
    /// Network gas price is above the configured ceiling
    #[display("gas price {gas_price_wei} above max {max_gas_price_wei}")]
    GasPriceTooHigh {
        /// Current gas price
        gas_price_wei: u128,
        /// Configured ceiling
        max_gas_price_wei: u128,
    },
    /// The live re-quote is below what the request was priced at
    #[display("stale quote: route now returns {quoted}, request needs {min_amount_out}")]
    StaleQuote {
        /// Output quoted against live pools
        quoted: U256,
        /// Minimum the request accepts
        min_amount_out: U256,
    },
    /// Swap proceeds do not cover principal plus fee
    #[display("insufficient repayment: owe {owed}, have {available}")]
    InsufficientRepayment {
        /// Principal plus fee
        owed: U256,
        /// Balance after the last hop
        available: U256,
    },
    /// The flash lender is unknown or cannot lend the amount
    #[display("flash loan unavailable: {reason}")]
    LoanUnavailable {
        /// Lender's answer
        reason: String,
    },
    /// The executor holds less than a capital-backed route needs
    #[display("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance {
        /// Input amount
        needed: U256,
        /// Executor balance
        available: U256,
    },
    /// A hop references a pool that does not exist on chain
    #[display("unknown pool {pool}")]
    UnknownPool {
        /// The missing pool
        pool: PoolId,
    },
    /// The request is malformed or a hop cannot execute
    #[display("invalid route: {reason}")]
    InvalidRoute {
        /// What is wrong
        reason: String,
    },
    /// An admin parameter was rejected
    #[display("invalid config: {reason}")]
    InvalidConfig {
        /// What is wrong
        reason: String,
    },
    /// `initialize` was called twice
    #[display("already initialized")]
    AlreadyInitialized,
    /// The guard has no config yet
    #[display("not initialized")]
    NotInitialized,
}
