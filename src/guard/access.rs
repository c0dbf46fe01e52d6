use std::collections::BTreeSet;
use std::fmt::{self, Display};

use alloy::primitives::{keccak256, Address, B256};
use serde::{Deserialize, Serialize};

/// Access-control roles of the executor contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Grants and revokes roles, updates parameters
    Admin,
    /// May call `executeRoute`
    Executor,
}

impl Role {
    /// On-chain role identifier, as OpenZeppelin `AccessControl` defines it
    #[must_use]
    pub fn id(self) -> B256 {
        match self {
            Self::Admin => B256::ZERO,
            Self::Executor => keccak256("EXECUTOR_ROLE"),
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Admin => write!(f, "DEFAULT_ADMIN_ROLE"),
            Self::Executor => write!(f, "EXECUTOR_ROLE"),
        }
    }
}

/// Persistent configuration of the executor contract.
///
/// Only changed through the guard's admin operations, each of which applies
/// to a copy and commits it whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionConfig {
    /// Deployer, first admin
    pub owner: Address,
    /// Flash-loan provider
    pub flash_lender: Address,
    /// Receiver of settled profit
    pub treasury: Address,
    /// Executions revert above this network gas price
    pub max_gas_price_wei: u128,
    roles: BTreeSet<(Role, Address)>,
}

impl ExecutionConfig {
    /// Config with `owner` as the only admin and no executors.
    #[must_use]
    pub fn new(owner: Address, flash_lender: Address, treasury: Address, max_gas_price_wei: u128) -> Self {
        Self {
            owner,
            flash_lender,
            treasury,
            max_gas_price_wei,
            roles: BTreeSet::from([(Role::Admin, owner)]),
        }
    }

    /// Whether `account` holds `role`
    #[must_use]
    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.roles.contains(&(role, account))
    }

    /// Adds `role` to `account`. Returns false if it was already held.
    pub fn grant(&mut self, role: Role, account: Address) -> bool {
        self.roles.insert((role, account))
    }

    /// Removes `role` from `account`. Returns false if it was not held.
    pub fn revoke(&mut self, role: Role, account: Address) -> bool {
        self.roles.remove(&(role, account))
    }

    /// Holders of `role`
    pub fn holders(&self, role: Role) -> impl Iterator<Item = Address> + '_ {
        self.roles
            .iter()
            .filter(move |(held, _)| *held == role)
            .map(|(_, account)| *account)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, b256};

    use super::*;

    #[test]
    fn test_role_ids() {
        assert_eq!(Role::Admin.id(), B256::ZERO);
        assert_eq!(
            Role::Executor.id(),
            b256!("d8aa0f3194971a2a116679f7c2090f6939c8d4e01a2a8d7e41d55e5351469e63")
        );
    }

    #[test]
    fn test_grant_and_revoke() {
        let owner = address!("00000000000000000000000000000000000000a1");
        let bot = address!("00000000000000000000000000000000000000b2");
        let mut config = ExecutionConfig::new(owner, Address::ZERO, owner, 50);

        assert!(config.has_role(Role::Admin, owner));
        assert!(!config.has_role(Role::Executor, bot));
        assert!(config.grant(Role::Executor, bot));
        assert!(!config.grant(Role::Executor, bot));
        assert_eq!(config.holders(Role::Executor).collect::<Vec<_>>(), vec![bot]);
        assert!(config.revoke(Role::Executor, bot));
        assert!(!config.has_role(Role::Executor, bot));
    }
}
