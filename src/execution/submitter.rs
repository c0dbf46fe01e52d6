use std::time::Duration;

use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes};
use alloy::providers::Provider;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use eyre::{bail, Result, WrapErr};
use log::{info, warn};

use super::contract;
use crate::guard::{ExecutionRequest, Role};

/// Sends transactions to the deployed executor contract through a signing
/// provider and waits for them to be mined.
#[derive(Debug, Clone)]
pub struct Submitter<P> {
    /// Provider with a wallet filler
    provider: P,
    /// Executor contract
    executor: Address,
    /// How long to wait for a receipt
    confirmation_timeout: Duration,
}

impl<P: Provider> Submitter<P> {
    /// Submitter for the executor at `executor`
    pub const fn new(provider: P, executor: Address, confirmation_timeout: Duration) -> Self {
        Self {
            provider,
            executor,
            confirmation_timeout,
        }
    }

    /// Sends `executeRoute` for `request`.
    ///
    /// # Errors
    ///
    /// Sending fails, no receipt within the timeout, or the transaction
    /// reverted.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<TransactionReceipt> {
        info!(
            "submitter: executing {} ({}) with {}",
            request.route, request.strategy, request.amount_in
        );
        self.send(contract::execute_route(request)).await
    }

    /// Sends `grantRole`.
    ///
    /// # Errors
    ///
    /// As [`Self::execute`].
    pub async fn grant_role(&self, role: Role, account: Address) -> Result<TransactionReceipt> {
        self.send(contract::grant_role(role, account)).await
    }

    /// Sends `revokeRole`.
    ///
    /// # Errors
    ///
    /// As [`Self::execute`].
    pub async fn revoke_role(&self, role: Role, account: Address) -> Result<TransactionReceipt> {
        self.send(contract::revoke_role(role, account)).await
    }

    /// Sends `setFlashLender`.
    ///
    /// # Errors
    ///
    /// As [`Self::execute`].
    pub async fn set_flash_lender(&self, lender: Address) -> Result<TransactionReceipt> {
        self.send(contract::set_flash_lender(lender)).await
    }

    /// Sends `setMaxGasPrice`.
    ///
    /// # Errors
    ///
    /// As [`Self::execute`].
    pub async fn set_max_gas_price(&self, max_gas_price_wei: u128) -> Result<TransactionReceipt> {
        self.send(contract::set_max_gas_price(max_gas_price_wei)).await
    }

    /// Sends `setTreasury`.
    ///
    /// # Errors
    ///
    /// As [`Self::execute`].
    pub async fn set_treasury(&self, treasury: Address) -> Result<TransactionReceipt> {
        self.send(contract::set_treasury(treasury)).await
    }

    async fn send(&self, calldata: Bytes) -> Result<TransactionReceipt> {
        let tx = TransactionRequest::default()
            .with_to(self.executor)
            .with_input(calldata);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .wrap_err("sending transaction to executor")?;
        let hash = *pending.tx_hash();
        info!("submitter: sent {hash}, waiting up to {:?}", self.confirmation_timeout);

        let receipt = pending
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .wrap_err_with(|| format!("no receipt for {hash}"))?;
        if !receipt.status() {
            warn!("submitter: {hash} reverted in block {:?}", receipt.block_number);
            bail!("transaction {hash} reverted");
        }
        info!(
            "submitter: {hash} mined in block {:?}, gas used {}",
            receipt.block_number, receipt.gas_used
        );
        Ok(receipt)
    }
}
