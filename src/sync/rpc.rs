use std::future::Future;

use alloy::eips::BlockId;
use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::sol;
use eyre::{eyre, Result, WrapErr};
use futures::future::join_all;
use log::{info, warn};

use super::catalog::Catalog;
use super::ReserveSource;
use crate::arb::pool::{Pool, PoolKind};
use crate::arb::registry::RegistrySnapshot;

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }

    #[sol(rpc)]
    interface IBalancerWeightedPool {
        function getPoolId() external view returns (bytes32);
        function getVault() external view returns (address);
        function getNormalizedWeights() external view returns (uint256[] memory);
    }

    #[sol(rpc)]
    interface IBalancerVault {
        function getPoolTokens(bytes32 poolId) external view returns (address[] memory tokens, uint256[] memory balances, uint256 lastChangeBlock);
    }

    #[sol(rpc)]
    interface ICurvePool {
        function balances(uint256 i) external view returns (uint256);
        function A() external view returns (uint256);
    }
}

/// Registered tokens of a Balancer pool with their vault balances and
/// normalized weights, index-aligned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalancerPoolState {
    /// Pool tokens in vault order
    pub tokens: Vec<Address>,
    /// Vault balance per token
    pub balances: Vec<U256>,
    /// Normalized WAD weight per token
    pub weights: Vec<U256>,
}

impl BalancerPoolState {
    /// `(balance, weight)` of `token`
    ///
    /// # Errors
    ///
    /// The token is not registered in the pool, or the pool answered with
    /// lists of different lengths.
    pub fn side(&self, token: Address) -> Result<(U256, U256)> {
        if self.balances.len() != self.tokens.len() || self.weights.len() != self.tokens.len() {
            return Err(eyre!(
                "{} tokens, {} balances and {} weights",
                self.tokens.len(),
                self.balances.len(),
                self.weights.len()
            ));
        }
        let index = self
            .tokens
            .iter()
            .position(|registered| *registered == token)
            .ok_or_else(|| eyre!("token {token} is not registered in the pool"))?;
        Ok((self.balances[index], self.weights[index]))
    }
}

/// The contract reads a snapshot is built from. Every read names the block
/// it is made at.
pub trait PoolReads: Send + Sync {
    /// Latest block number
    fn block_number(&self) -> impl Future<Output = Result<u64>> + Send;

    /// `(reserve0, reserve1)` of a Uniswap V2 style pair
    fn pair_reserves(&self, pair: Address, block: BlockId) -> impl Future<Output = Result<(U256, U256)>> + Send;

    /// Vault balances and weights of a Balancer weighted pool
    fn balancer_pool(&self, pool: Address, block: BlockId) -> impl Future<Output = Result<BalancerPoolState>> + Send;

    /// `(balance0, balance1, A)` of a two-coin Curve pool
    fn curve_pool(&self, pool: Address, block: BlockId) -> impl Future<Output = Result<(U256, U256, U256)>> + Send;
}

/// [`PoolReads`] over a JSON-RPC provider.
#[derive(Debug, Clone)]
pub struct ChainReads<P>(pub P);

impl<P: Provider> PoolReads for ChainReads<P> {
    async fn block_number(&self) -> Result<u64> {
        self.0
            .get_block_number()
            .await
            .wrap_err("reading block number")
    }

    async fn pair_reserves(&self, pair: Address, block: BlockId) -> Result<(U256, U256)> {
        let reserves = IUniswapV2Pair::new(pair, &self.0)
            .getReserves()
            .block(block)
            .call()
            .await?;
        Ok((U256::from(reserves.reserve0), U256::from(reserves.reserve1)))
    }

    async fn balancer_pool(&self, pool: Address, block: BlockId) -> Result<BalancerPoolState> {
        let weighted = IBalancerWeightedPool::new(pool, &self.0);
        let pool_id = weighted.getPoolId().block(block).call().await?._0;
        let vault = weighted.getVault().block(block).call().await?._0;
        let weights = weighted.getNormalizedWeights().block(block).call().await?._0;
        let registered = IBalancerVault::new(vault, &self.0)
            .getPoolTokens(pool_id)
            .block(block)
            .call()
            .await?;
        Ok(BalancerPoolState {
            tokens: registered.tokens,
            balances: registered.balances,
            weights,
        })
    }

    async fn curve_pool(&self, pool: Address, block: BlockId) -> Result<(U256, U256, U256)> {
        let curve = ICurvePool::new(pool, &self.0);
        let balance0 = curve.balances(U256::ZERO).block(block).call().await?._0;
        let balance1 = curve.balances(U256::from(1)).block(block).call().await?._0;
        let amplification = curve.A().block(block).call().await?._0;
        Ok((balance0, balance1, amplification))
    }
}

/// Reads reserves of the catalog's pools from deployed contracts, all at
/// the same block.
///
/// Pools that fail to answer are left out of the snapshot with a warning.
#[derive(Debug, Clone)]
pub struct RpcReserveSource<R> {
    reads: R,
    catalog: Catalog,
}

impl<P: Provider> RpcReserveSource<ChainReads<P>> {
    /// Source reading the pools of `catalog` through `provider`
    pub const fn new(provider: P, catalog: Catalog) -> Self {
        Self::with_reads(ChainReads(provider), catalog)
    }
}

impl<R: PoolReads> RpcReserveSource<R> {
    /// Source reading the pools of `catalog` through `reads`
    pub const fn with_reads(reads: R, catalog: Catalog) -> Self {
        Self { reads, catalog }
    }

    async fn read_pool(&self, pool: Pool, block: BlockId) -> Result<Pool> {
        let address = pool.id.address();
        match pool.kind {
            PoolKind::ConstantProduct => {
                let (reserve0, reserve1) = self.reads.pair_reserves(address, block).await?;
                Ok(Pool {
                    reserve0,
                    reserve1,
                    ..pool
                })
            }
            PoolKind::Weighted { .. } => {
                let state = self.reads.balancer_pool(address, block).await?;
                let (reserve0, weight0) = state.side(pool.token0.address())?;
                let (reserve1, weight1) = state.side(pool.token1.address())?;
                Ok(Pool {
                    reserve0,
                    reserve1,
                    kind: PoolKind::Weighted { weight0, weight1 },
                    ..pool
                })
            }
            PoolKind::StableSwap { .. } => {
                let (reserve0, reserve1, amplification) = self.reads.curve_pool(address, block).await?;
                Ok(Pool {
                    reserve0,
                    reserve1,
                    kind: PoolKind::StableSwap { amplification },
                    ..pool
                })
            }
        }
    }
}

impl<R: PoolReads> ReserveSource for RpcReserveSource<R> {
    async fn fetch(&self) -> Result<RegistrySnapshot> {
        let block_number = self.reads.block_number().await?;
        let block = BlockId::number(block_number);
        let tokens = self.catalog.tokens()?;
        let pools = self.catalog.pools()?;
        let requested = pools.len();

        let reads = join_all(pools.into_iter().map(|pool| {
            let id = pool.id;
            async move { (id, self.read_pool(pool, block).await) }
        }))
        .await;

        let mut fresh = Vec::with_capacity(requested);
        for (id, read) in reads {
            match read {
                Ok(pool) => fresh.push(pool),
                Err(e) => warn!("sync::rpc: skipping pool {id}: {e:#}"),
            }
        }
        info!(
            "sync::rpc: read {}/{} pools at block {block_number}",
            fresh.len(),
            requested
        );

        Ok(RegistrySnapshot::new(block_number, tokens, fresh)?)
    }
}
