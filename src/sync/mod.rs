//! Reserve sources: where registry snapshots come from.
//!
//! A source produces a complete [`RegistrySnapshot`] per call. It never
//! patches a published snapshot in place.

/// Token and pool catalog files
pub mod catalog;
/// Reserves read from deployed pool contracts
pub mod rpc;
/// Snapshots stored as catalog files with reserves
pub mod snapshot_file;

use std::future::Future;

use eyre::Result;

use crate::arb::registry::RegistrySnapshot;

pub use catalog::Catalog;
pub use rpc::RpcReserveSource;
pub use snapshot_file::SnapshotFile;

/// Anything that can produce a fresh registry snapshot.
pub trait ReserveSource {
    /// Reads every pool once and builds a snapshot.
    ///
    /// # Errors
    ///
    /// The source is unreachable or returns data that does not form a valid
    /// snapshot.
    fn fetch(&self) -> impl Future<Output = Result<RegistrySnapshot>> + Send;
}
