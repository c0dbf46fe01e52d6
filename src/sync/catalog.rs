use std::path::Path;
use std::str::FromStr;

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};

use crate::arb::pool::{Pool, PoolKind};
use crate::arb::registry::RegistrySnapshot;
use crate::arb::token::Token;
use crate::arb::types::{PoolId, TokenId};

/// Tokens and pools to track, as stored on disk.
///
/// Addresses and amounts are strings so catalogs can be written by hand.
/// Reserves are optional: a catalog without them only describes pools for
/// an RPC source to read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    /// Block the reserves were read at
    #[serde(default)]
    pub block_number: u64,
    /// Known tokens
    pub tokens: Vec<TokenEntry>,
    /// Known pools
    pub pools: Vec<PoolEntry>,
}

/// One token of a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    /// Contract address, hex
    pub address: String,
    /// Ticker
    pub symbol: String,
    /// ERC-20 decimals
    pub decimals: u8,
}

/// Pricing invariant of a catalog pool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KindEntry {
    /// `x * y = k`
    #[default]
    ConstantProduct,
    /// Normalized WAD weights, decimal strings
    Weighted {
        /// Weight of token0
        weight0: String,
        /// Weight of token1
        weight1: String,
    },
    /// Curve amplification, decimal string
    StableSwap {
        /// `A`
        amplification: String,
    },
}

/// One pool of a catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolEntry {
    /// Pool contract address, hex
    pub address: String,
    /// First token address, hex
    pub token0: String,
    /// Second token address, hex
    pub token1: String,
    /// Swap fee in bps
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,
    /// Invariant
    #[serde(default)]
    pub kind: KindEntry,
    /// Reserve of token0 in raw units, decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve0: Option<String>,
    /// Reserve of token1 in raw units, decimal string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve1: Option<String>,
}

const fn default_fee_bps() -> u32 {
    30
}

impl Catalog {
    /// Reads a JSON catalog.
    ///
    /// # Errors
    ///
    /// Unreadable file or invalid JSON.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("reading catalog {}", path.display()))?;
        Self::from_json(&raw).wrap_err_with(|| format!("parsing catalog {}", path.display()))
    }

    /// Parses a JSON catalog.
    ///
    /// # Errors
    ///
    /// Invalid JSON or a missing field.
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Parsed tokens.
    ///
    /// # Errors
    ///
    /// A malformed address.
    pub fn tokens(&self) -> Result<Vec<Token>> {
        self.tokens
            .iter()
            .map(|entry| {
                Ok(Token::new(
                    TokenId(parse_address(&entry.address)?),
                    entry.symbol.clone(),
                    entry.decimals,
                ))
            })
            .collect()
    }

    /// Parsed pools. Missing reserves are zero.
    ///
    /// # Errors
    ///
    /// A malformed address or amount.
    pub fn pools(&self) -> Result<Vec<Pool>> {
        self.pools.iter().map(PoolEntry::to_pool).collect()
    }

    /// Snapshot of the catalog's own reserves.
    ///
    /// # Errors
    ///
    /// Malformed entries, or pools that do not form a valid snapshot.
    pub fn snapshot(&self) -> Result<RegistrySnapshot> {
        Ok(RegistrySnapshot::new(
            self.block_number,
            self.tokens()?,
            self.pools()?,
        )?)
    }
}

impl PoolEntry {
    /// The pool this entry describes
    ///
    /// # Errors
    ///
    /// A malformed address or amount.
    pub fn to_pool(&self) -> Result<Pool> {
        let kind = match &self.kind {
            KindEntry::ConstantProduct => PoolKind::ConstantProduct,
            KindEntry::Weighted { weight0, weight1 } => PoolKind::Weighted {
                weight0: parse_amount(weight0)?,
                weight1: parse_amount(weight1)?,
            },
            KindEntry::StableSwap { amplification } => PoolKind::StableSwap {
                amplification: parse_amount(amplification)?,
            },
        };
        let reserve = |raw: &Option<String>| raw.as_deref().map_or(Ok(U256::ZERO), parse_amount);

        Ok(Pool::new(
            PoolId(parse_address(&self.address)?),
            TokenId(parse_address(&self.token0)?),
            TokenId(parse_address(&self.token1)?),
            reserve(&self.reserve0)?,
            reserve(&self.reserve1)?,
        )
        .with_fee(self.fee_bps)
        .with_kind(kind))
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    Address::from_str(raw).map_err(|e| eyre!("invalid address {raw:?}: {e}"))
}

fn parse_amount(raw: &str) -> Result<U256> {
    U256::from_str(raw).map_err(|e| eyre!("invalid amount {raw:?}: {e}"))
}
