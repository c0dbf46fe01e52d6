//! On-chain side of execution: calldata for the deployed executor contract
//! and a submitter that sends it.

/// Executor contract ABI and calldata builders
pub mod contract;
mod submitter;

pub use submitter::Submitter;
