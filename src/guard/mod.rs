//! # Execution Guard
//!
//! The executor contract as a state machine over a [`ChainState`]. An
//! execution is one transaction: it runs on the live state after taking a
//! checkpoint, and a revert anywhere restores the checkpoint so only the
//! caller's gas is spent.
//!
//! ```text
//! Idle -> Borrowing -> Swapping -> Repaying -> Settled
//!   \________\___________\___________\-----> Reverted
//! ```
//!
//! Capital-backed requests skip `Borrowing` and "repay" the contract's own
//! capital.

mod access;
mod chain;
mod receipt;
mod state;

use alloy::primitives::{Address, U256};
use log::{debug, info, warn};

use crate::arb::rank::{GasModel, Strategy};
use crate::arb::route_quote::HopQuote;

pub use access::{ExecutionConfig, Role};
pub use chain::{ChainState, FlashLender};
pub use receipt::{ExecutionReceipt, ExecutionRequest};
pub use state::{GuardState, RevertReason};

/// A deployed executor contract.
#[derive(Debug, Clone)]
pub struct ExecutionGuard {
    address: Address,
    gas: GasModel,
    config: Option<ExecutionConfig>,
}

/// Gas and states accumulated by one run
struct Run {
    /// States entered so far
    trail: Vec<GuardState>,
    /// Gas charged so far
    gas_used: u64,
    /// Hops swapped so far
    hops: Vec<HopQuote>,
}

impl Run {
    fn enter(&mut self, state: GuardState) {
        self.trail.push(state);
    }

    fn burn(&mut self, gas: u64) {
        self.gas_used = self.gas_used.saturating_add(gas);
    }
}

impl ExecutionGuard {
    /// A freshly deployed, uninitialized contract at `address`
    #[must_use]
    pub fn deploy(address: Address) -> Self {
        Self {
            address,
            gas: GasModel::default(),
            config: None,
        }
    }

    /// Meters executions with `gas` instead of the default model
    #[must_use]
    pub fn with_gas_model(mut self, gas: GasModel) -> Self {
        self.gas = gas;
        self
    }

    /// Contract address. Holds capital and receives loans.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Current config, `None` until initialized
    #[must_use]
    pub const fn config(&self) -> Option<&ExecutionConfig> {
        self.config.as_ref()
    }

    /// Sets the initial config. `caller` becomes owner and admin.
    ///
    /// # Errors
    ///
    /// `AlreadyInitialized`, or `InvalidConfig` for a zero lender or treasury.
    pub fn initialize(
        &mut self,
        caller: Address,
        flash_lender: Address,
        treasury: Address,
        max_gas_price_wei: u128,
    ) -> Result<(), RevertReason> {
        if self.config.is_some() {
            return Err(RevertReason::AlreadyInitialized);
        }
        non_zero(flash_lender, "flash lender")?;
        non_zero(treasury, "treasury")?;
        self.config = Some(ExecutionConfig::new(
            caller,
            flash_lender,
            treasury,
            max_gas_price_wei,
        ));
        info!("guard: {} initialized by {caller}", self.address);
        Ok(())
    }

    /// Grants `role` to `account`. Granting a held role is a no-op.
    ///
    /// # Errors
    ///
    /// `NotInitialized` or `Unauthorized`.
    pub fn grant_role(&mut self, caller: Address, role: Role, account: Address) -> Result<(), RevertReason> {
        self.update(caller, |config| {
            config.grant(role, account);
            Ok(())
        })
    }

    /// Revokes `role` from `account`.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, `Unauthorized`, or `InvalidConfig` when it would
    /// leave the contract without an admin.
    pub fn revoke_role(&mut self, caller: Address, role: Role, account: Address) -> Result<(), RevertReason> {
        self.update(caller, |config| {
            config.revoke(role, account);
            if config.holders(Role::Admin).next().is_none() {
                return Err(RevertReason::InvalidConfig {
                    reason: "cannot remove the last admin".to_string(),
                });
            }
            Ok(())
        })
    }

    /// # Errors
    ///
    /// `NotInitialized`, `Unauthorized`, or `InvalidConfig` for zero.
    pub fn set_max_gas_price(&mut self, caller: Address, max_gas_price_wei: u128) -> Result<(), RevertReason> {
        self.update(caller, |config| {
            if max_gas_price_wei == 0 {
                return Err(RevertReason::InvalidConfig {
                    reason: "max gas price must be positive".to_string(),
                });
            }
            config.max_gas_price_wei = max_gas_price_wei;
            Ok(())
        })
    }

    /// # Errors
    ///
    /// `NotInitialized`, `Unauthorized`, or `InvalidConfig` for the zero address.
    pub fn set_treasury(&mut self, caller: Address, treasury: Address) -> Result<(), RevertReason> {
        self.update(caller, |config| {
            non_zero(treasury, "treasury")?;
            config.treasury = treasury;
            Ok(())
        })
    }

    /// # Errors
    ///
    /// `NotInitialized`, `Unauthorized`, or `InvalidConfig` for the zero address.
    pub fn set_flash_lender(&mut self, caller: Address, flash_lender: Address) -> Result<(), RevertReason> {
        self.update(caller, |config| {
            non_zero(flash_lender, "flash lender")?;
            config.flash_lender = flash_lender;
            Ok(())
        })
    }

    /// Applies an admin change to a copy of the config and commits it only
    /// if the change succeeds.
    fn update(
        &mut self,
        caller: Address,
        change: impl FnOnce(&mut ExecutionConfig) -> Result<(), RevertReason>,
    ) -> Result<(), RevertReason> {
        let current = self.config.as_ref().ok_or(RevertReason::NotInitialized)?;
        if !current.has_role(Role::Admin, caller) {
            return Err(RevertReason::Unauthorized {
                account: caller,
                role: Role::Admin,
            });
        }
        let mut next = current.clone();
        change(&mut next)?;
        self.config = Some(next);
        Ok(())
    }

    /// Executes `request` as one transaction sent by `caller`.
    ///
    /// Never fails: a revert is reported in the receipt, with `chain` back
    /// at its pre-transaction state apart from the caller's gas.
    pub fn execute(&self, chain: &mut ChainState, caller: Address, request: &ExecutionRequest) -> ExecutionReceipt {
        let checkpoint = chain.clone();
        let mut run = Run {
            trail: vec![GuardState::Idle],
            gas_used: self.gas.base,
            hops: Vec::new(),
        };

        let outcome = self.run(chain, caller, request, &mut run);
        let (actual_profit, revert_reason) = match outcome {
            Ok(profit) => {
                run.enter(GuardState::Settled);
                info!(
                    "guard: settled {} ({}), profit {profit}",
                    request.route, request.strategy
                );
                (profit, None)
            }
            Err(reason) => {
                *chain = checkpoint;
                run.enter(GuardState::Reverted);
                warn!("guard: reverted {}: {reason}", request.route);
                (U256::ZERO, Some(reason))
            }
        };
        let gas_fee_wei = chain.charge_gas(caller, run.gas_used);

        ExecutionReceipt {
            route: request.route.key(),
            strategy: request.strategy,
            amount_in: request.amount_in,
            actual_profit,
            gas_used: run.gas_used,
            gas_fee_wei,
            final_state: run.trail.last().copied().unwrap_or(GuardState::Reverted),
            revert_reason,
            trail: run.trail,
            hops: run.hops,
        }
    }

    /// Every state but the terminal one. Returns the profit sent to the
    /// treasury.
    fn run(
        &self,
        chain: &mut ChainState,
        caller: Address,
        request: &ExecutionRequest,
        run: &mut Run,
    ) -> Result<U256, RevertReason> {
        let config = self.config.as_ref().ok_or(RevertReason::NotInitialized)?;
        if !config.has_role(Role::Executor, caller) {
            return Err(RevertReason::Unauthorized {
                account: caller,
                role: Role::Executor,
            });
        }
        if chain.gas_price_wei() > config.max_gas_price_wei {
            return Err(RevertReason::GasPriceTooHigh {
                gas_price_wei: chain.gas_price_wei(),
                max_gas_price_wei: config.max_gas_price_wei,
            });
        }
        if request.amount_in.is_zero() {
            return Err(RevertReason::InvalidRoute {
                reason: "zero input".to_string(),
            });
        }

        let base = request.route.base();
        let quote = request.route.quote(&*chain, request.amount_in)?;
        debug!(
            "guard: {} re-quoted at {} bps",
            request.route,
            quote.profit_bps()
        );
        if quote.amount_out() < request.min_amount_out {
            return Err(RevertReason::StaleQuote {
                quoted: quote.amount_out(),
                min_amount_out: request.min_amount_out,
            });
        }

        let owed = match request.strategy {
            Strategy::FlashLoan => {
                run.enter(GuardState::Borrowing);
                run.burn(self.gas.flash_loan_overhead);
                chain.request_loan(config.flash_lender, self.address, base, request.amount_in)?
            }
            Strategy::CapitalBacked => {
                let available = chain.balance(self.address, base);
                if available < request.amount_in {
                    return Err(RevertReason::InsufficientBalance {
                        needed: request.amount_in,
                        available,
                    });
                }
                request.amount_in
            }
        };

        run.enter(GuardState::Swapping);
        let mut amount = request.amount_in;
        for swap in request.route.swaps() {
            run.burn(self.gas.per_hop);
            let amount_out = chain.swap(self.address, swap, amount)?;
            run.hops.push(HopQuote {
                swap: *swap,
                amount_in: amount,
                amount_out,
            });
            amount = amount_out;
        }

        run.enter(GuardState::Repaying);
        if amount < owed {
            return Err(RevertReason::InsufficientRepayment {
                owed,
                available: amount,
            });
        }
        if request.strategy == Strategy::FlashLoan {
            chain.repay(config.flash_lender, self.address, base)?;
        }

        let profit = amount - owed;
        if !profit.is_zero() {
            chain.transfer(self.address, config.treasury, base, profit)?;
        }
        Ok(profit)
    }
}

fn non_zero(address: Address, what: &str) -> Result<(), RevertReason> {
    if address.is_zero() {
        return Err(RevertReason::InvalidConfig {
            reason: format!("{what} cannot be the zero address"),
        });
    }
    Ok(())
}
