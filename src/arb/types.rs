use std::fmt::{self, Debug, Display};
use std::str::FromStr;

use alloy::primitives::Address;

/// On-chain address of a token contract.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TokenId(pub Address);

/// On-chain address of a liquidity pool.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PoolId(pub Address);

macro_rules! address_id {
    ($name:ident) => {
        impl $name {
            /// The underlying address
            #[must_use]
            pub const fn address(&self) -> Address {
                self.0
            }
        }

        impl From<Address> for $name {
            fn from(address: Address) -> Self {
                Self(address)
            }
        }

        impl FromStr for $name {
            type Err = eyre::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let address = Address::from_str(s.trim())
                    .map_err(|e| eyre::eyre!("invalid address {s}: {e}"))?;
                Ok(Self(address))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        // Short form keeps route dumps readable: 0x1234..abcd
        impl Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let hex = self.0.to_string();
                write!(f, "{}..{}", &hex[..6], &hex[hex.len() - 4..])
            }
        }
    };
}

address_id!(TokenId);
address_id!(PoolId);
