use std::fmt::{self, Display};

use super::types::TokenId;

/// An ERC-20 token as loaded from the pool catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token {
    /// Contract address
    pub id: TokenId,
    /// Ticker symbol, e.g. `DAI`
    pub symbol: String,
    /// Number of decimals of the raw on-chain amount
    pub decimals: u8,
}

impl Token {
    /// Creates a new token.
    #[must_use]
    pub fn new(id: TokenId, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            id,
            symbol: symbol.into(),
            decimals,
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
