//! In-memory chain state the execution guard runs against: token ledger,
//! live pools, flash lenders and the network gas price.
//!
//! `Clone` is the checkpoint. A reverted execution puts the clone back.

use std::collections::BTreeMap;

use alloy::primitives::{Address, U256};

use crate::arb::math::BPS;
use crate::arb::pool::{Pool, PoolLookup};
use crate::arb::route_quote::QuoteError;
use crate::arb::swap::Swap;
use crate::arb::types::{PoolId, TokenId};

use super::state::RevertReason;

/// A flash-loan provider: lends its own balance for a fee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashLender {
    /// Fee on the principal, in bps
    pub fee_bps: u32,
    /// Principal plus fee owed per token, within the current transaction
    outstanding: BTreeMap<TokenId, U256>,
}

impl FlashLender {
    /// A lender charging `fee_bps`
    #[must_use]
    pub const fn new(fee_bps: u32) -> Self {
        Self {
            fee_bps,
            outstanding: BTreeMap::new(),
        }
    }

    /// Fee owed on `principal`
    #[must_use]
    pub fn fee(&self, principal: U256) -> U256 {
        principal.saturating_mul(U256::from(self.fee_bps)) / U256::from(BPS)
    }

    /// Amount owed for `token`
    #[must_use]
    pub fn outstanding(&self, token: TokenId) -> U256 {
        self.outstanding.get(&token).copied().unwrap_or_default()
    }
}

/// Token balances, pools and lenders of a simulated chain.
#[derive(Debug, Clone, Default)]
pub struct ChainState {
    balances: BTreeMap<(Address, TokenId), U256>,
    native: BTreeMap<Address, U256>,
    pools: BTreeMap<PoolId, Pool>,
    lenders: BTreeMap<Address, FlashLender>,
    gas_price_wei: u128,
}

impl ChainState {
    /// Chain with the given pools and gas price
    #[must_use]
    pub fn new(pools: impl IntoIterator<Item = Pool>, gas_price_wei: u128) -> Self {
        Self {
            pools: pools.into_iter().map(|pool| (pool.id, pool)).collect(),
            gas_price_wei,
            ..Self::default()
        }
    }

    /// Current network gas price
    #[must_use]
    pub const fn gas_price_wei(&self) -> u128 {
        self.gas_price_wei
    }

    /// Moves the network gas price
    pub fn set_gas_price(&mut self, gas_price_wei: u128) {
        self.gas_price_wei = gas_price_wei;
    }

    /// Token balance of `account`
    #[must_use]
    pub fn balance(&self, account: Address, token: TokenId) -> U256 {
        self.balances
            .get(&(account, token))
            .copied()
            .unwrap_or_default()
    }

    /// Native balance of `account`, in wei
    #[must_use]
    pub fn native_balance(&self, account: Address) -> U256 {
        self.native.get(&account).copied().unwrap_or_default()
    }

    /// Credits `amount` of `token` to `account`
    pub fn mint(&mut self, account: Address, token: TokenId, amount: U256) {
        let balance = self.balances.entry((account, token)).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Credits native currency to `account`
    pub fn fund_native(&mut self, account: Address, wei: U256) {
        let balance = self.native.entry(account).or_default();
        *balance = balance.saturating_add(wei);
    }

    /// Registers a flash lender at `address`
    pub fn add_lender(&mut self, address: Address, lender: FlashLender) {
        self.lenders.insert(address, lender);
    }

    /// Lender at `address`
    #[must_use]
    pub fn lender(&self, address: Address) -> Option<&FlashLender> {
        self.lenders.get(&address)
    }

    /// Moves tokens between accounts.
    ///
    /// # Errors
    ///
    /// `InsufficientBalance` when `from` holds less than `amount`.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        token: TokenId,
        amount: U256,
    ) -> Result<(), RevertReason> {
        let available = self.balance(from, token);
        if available < amount {
            return Err(RevertReason::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        self.balances.insert((from, token), available - amount);
        self.mint(to, token, amount);
        Ok(())
    }

    /// Lends `amount` of `token` from the lender at `lender` to `borrower`.
    ///
    /// # Errors
    ///
    /// `LoanUnavailable` for an unknown lender, one with an open loan of the
    /// same token, or one without enough liquidity.
    pub fn request_loan(
        &mut self,
        lender: Address,
        borrower: Address,
        token: TokenId,
        amount: U256,
    ) -> Result<U256, RevertReason> {
        let Some(provider) = self.lenders.get(&lender) else {
            return Err(RevertReason::LoanUnavailable {
                reason: format!("no flash lender at {lender}"),
            });
        };
        if !provider.outstanding(token).is_zero() {
            return Err(RevertReason::LoanUnavailable {
                reason: "loan already open".to_string(),
            });
        }
        let owed = amount.saturating_add(provider.fee(amount));
        self.transfer(lender, borrower, token, amount)
            .map_err(|_| RevertReason::LoanUnavailable {
                reason: format!("lender cannot provide {amount}"),
            })?;
        if let Some(provider) = self.lenders.get_mut(&lender) {
            provider.outstanding.insert(token, owed);
        }
        Ok(owed)
    }

    /// Repays the open loan of `token` in full from `borrower`.
    ///
    /// # Errors
    ///
    /// `InsufficientRepayment` when the borrower holds less than principal
    /// plus fee. Nothing is repaid in that case.
    pub fn repay(&mut self, lender: Address, borrower: Address, token: TokenId) -> Result<(), RevertReason> {
        let owed = self
            .lenders
            .get(&lender)
            .map(|provider| provider.outstanding(token))
            .unwrap_or_default();
        let available = self.balance(borrower, token);
        if available < owed {
            return Err(RevertReason::InsufficientRepayment { owed, available });
        }
        self.transfer(borrower, lender, token, owed)?;
        if let Some(provider) = self.lenders.get_mut(&lender) {
            provider.outstanding.remove(&token);
        }
        Ok(())
    }

    /// Executes one hop for `trader` at live reserves and returns the output.
    ///
    /// # Errors
    ///
    /// `UnknownPool`, `InvalidRoute` when the pool math fails, or
    /// `InsufficientBalance` when the trader cannot pay the input.
    pub fn swap(&mut self, trader: Address, swap: &Swap, amount_in: U256) -> Result<U256, RevertReason> {
        let amount_out = swap
            .amount_out(&*self, amount_in)
            .map_err(RevertReason::from)?;
        if amount_out.is_zero() {
            return Err(RevertReason::InvalidRoute {
                reason: format!("hop {} returns nothing", swap.id()),
            });
        }

        let available = self.balance(trader, swap.token_in());
        if available < amount_in {
            return Err(RevertReason::InsufficientBalance {
                needed: amount_in,
                available,
            });
        }
        self.balances
            .insert((trader, swap.token_in()), available - amount_in);
        self.mint(trader, swap.token_out(), amount_out);

        if let Some(pool) = self.pools.get_mut(&swap.pool_id()) {
            pool.apply_swap(&swap.id().direction, amount_in, amount_out);
        }
        Ok(amount_out)
    }

    /// Burns `gas_used * gas_price` wei from `payer`, saturating at zero.
    /// Returns the fee.
    pub fn charge_gas(&mut self, payer: Address, gas_used: u64) -> U256 {
        let fee = U256::from(gas_used).saturating_mul(U256::from(self.gas_price_wei));
        let balance = self.native.entry(payer).or_default();
        *balance = balance.saturating_sub(fee);
        fee
    }
}

impl PoolLookup for ChainState {
    fn pool(&self, id: &PoolId) -> Option<&Pool> {
        self.pools.get(id)
    }
}

impl From<QuoteError> for RevertReason {
    fn from(error: QuoteError) -> Self {
        match error {
            QuoteError::UnknownPool { pool } => Self::UnknownPool { pool },
            QuoteError::Math(e) => Self::InvalidRoute {
                reason: e.to_string(),
            },
        }
    }
}
