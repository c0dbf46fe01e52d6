use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;
use eyre::{eyre, Result};
use url::Url;

/// Process configuration, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// JSON-RPC endpoint, `FLASHROUTE_RPC_URL`
    pub rpc_url: Option<Url>,
    /// Token and pool catalog, `FLASHROUTE_CATALOG`
    pub catalog: PathBuf,
    /// Pipeline config file, `FLASHROUTE_CONFIG`
    pub pipeline_config: Option<PathBuf>,
    /// Opportunity feed, `FLASHROUTE_FEED`
    pub feed: PathBuf,
    /// Execution receipts, `FLASHROUTE_RECEIPTS`
    pub receipts: PathBuf,
    /// Deployed executor contract, `FLASHROUTE_EXECUTOR_ADDRESS`
    pub executor_address: Option<Address>,
    /// Time between watch cycles, `FLASHROUTE_INTERVAL_SECS`
    pub interval: Duration,
    /// Overrides the pipeline's snapshot age limit, `FLASHROUTE_MAX_SNAPSHOT_AGE_SECS`
    pub max_snapshot_age_secs: Option<u64>,
    /// Tolerated shortfall below the expected output, `FLASHROUTE_SLIPPAGE_BPS`
    pub slippage_bps: u32,
    /// Slack token, `SLACK_OAUTH_TOKEN`
    pub slack_token: Option<String>,
    /// Key of the executor account, `FLASHROUTE_PRIVATE_KEY`. Without it the
    /// bot only reports.
    pub private_key: Option<String>,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// A variable is set but malformed.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every setting through `lookup`.
    ///
    /// # Errors
    ///
    /// A variable is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let path = |key: &str, default: &str| PathBuf::from(lookup(key).unwrap_or_else(|| default.to_string()));

        Ok(Self {
            rpc_url: parse(&lookup, "FLASHROUTE_RPC_URL")?,
            catalog: path("FLASHROUTE_CATALOG", "catalog.json"),
            pipeline_config: lookup("FLASHROUTE_CONFIG").map(PathBuf::from),
            feed: path("FLASHROUTE_FEED", "opportunities.jsonl"),
            receipts: path("FLASHROUTE_RECEIPTS", "receipts.jsonl"),
            executor_address: parse(&lookup, "FLASHROUTE_EXECUTOR_ADDRESS")?,
            interval: Duration::from_secs(parse(&lookup, "FLASHROUTE_INTERVAL_SECS")?.unwrap_or(12)),
            max_snapshot_age_secs: parse(&lookup, "FLASHROUTE_MAX_SNAPSHOT_AGE_SECS")?,
            slippage_bps: parse(&lookup, "FLASHROUTE_SLIPPAGE_BPS")?.unwrap_or(10),
            slack_token: lookup("SLACK_OAUTH_TOKEN").filter(|token| !token.is_empty()),
            private_key: lookup("FLASHROUTE_PRIVATE_KEY").filter(|key| !key.is_empty()),
        })
    }

    /// The RPC endpoint.
    ///
    /// # Errors
    ///
    /// `FLASHROUTE_RPC_URL` is not set.
    pub fn require_rpc_url(&self) -> Result<Url> {
        self.rpc_url
            .clone()
            .ok_or_else(|| eyre!("FLASHROUTE_RPC_URL must be set"))
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| eyre!("{key}={raw:?} is invalid: {e}"))
        })
        .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.rpc_url, None);
        assert_eq!(config.catalog, PathBuf::from("catalog.json"));
        assert_eq!(config.interval, Duration::from_secs(12));
        assert_eq!(config.slippage_bps, 10);
        assert!(config.require_rpc_url().is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("FLASHROUTE_RPC_URL", "http://localhost:8545"),
            ("FLASHROUTE_EXECUTOR_ADDRESS", "0x00000000000000000000000000000000000000e1"),
            ("FLASHROUTE_INTERVAL_SECS", "3"),
            ("FLASHROUTE_MAX_SNAPSHOT_AGE_SECS", " 60 "),
            ("SLACK_OAUTH_TOKEN", ""),
        ])
        .unwrap();
        assert_eq!(config.require_rpc_url().unwrap().as_str(), "http://localhost:8545/");
        assert!(config.executor_address.is_some());
        assert_eq!(config.interval, Duration::from_secs(3));
        assert_eq!(config.max_snapshot_age_secs, Some(60));
        assert_eq!(config.slack_token, None);
    }

    #[test]
    fn test_malformed_value() {
        let error = config(&[("FLASHROUTE_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(error.to_string().contains("FLASHROUTE_INTERVAL_SECS"));
    }
}
