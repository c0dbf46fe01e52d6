use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use log::debug;

use super::catalog::Catalog;
use super::ReserveSource;
use crate::arb::registry::RegistrySnapshot;

/// A catalog file with reserves, re-read on every fetch.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Source reading `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// File this source reads
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReserveSource for SnapshotFile {
    async fn fetch(&self) -> Result<RegistrySnapshot> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .wrap_err_with(|| format!("reading snapshot {}", self.path.display()))?;
        let catalog = Catalog::from_json(&raw)
            .wrap_err_with(|| format!("parsing snapshot {}", self.path.display()))?;
        debug!(
            "sync::snapshot_file: {} tokens, {} pools from {}",
            catalog.tokens.len(),
            catalog.pools.len(),
            self.path.display()
        );
        catalog.snapshot()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::arb::registry::{PoolRegistry, RegistryError};

    const SNAPSHOT: &str = r#"{
        "block_number": 7,
        "tokens": [
            {"address": "0x0000000000000000000000000000000000000001", "symbol": "WETH", "decimals": 18},
            {"address": "0x0000000000000000000000000000000000000002", "symbol": "DAI", "decimals": 18}
        ],
        "pools": [{
            "address": "0x00000000000000000000000000000000000000f1",
            "token0": "0x0000000000000000000000000000000000000001",
            "token1": "0x0000000000000000000000000000000000000002",
            "reserve0": "1000000000000000000000",
            "reserve1": "2500000000000000000000000"
        }]
    }"#;

    #[tokio::test]
    async fn test_refresh_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let registry = PoolRegistry::new();
        let snapshot = registry.refresh(&SnapshotFile::new(&path)).await.unwrap();
        assert_eq!(snapshot.block_number(), 7);
        assert_eq!(registry.snapshot().unwrap().block_number(), 7);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, SNAPSHOT).unwrap();
        let source = SnapshotFile::new(&path);

        let registry = PoolRegistry::new();
        registry.refresh(&source).await.unwrap();

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            registry.refresh(&source).await,
            Err(RegistryError::Unavailable { .. })
        ));
        assert_eq!(registry.snapshot().unwrap().block_number(), 7);
    }
}
