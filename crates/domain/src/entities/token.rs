use serde::{Deserialize, Serialize};

/// A tradable token. Immutable reference data.
///
/// Addresses are normalised to lowercase so that identity and the venue's
/// address ordering do not depend on checksum casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    pub symbol: String,
    pub name: String,
}

impl Token {
    pub fn new(
        address: impl Into<String>,
        symbol: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into().to_ascii_lowercase(),
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    /// Whether both values identify the same on-chain token.
    pub fn same_as(&self, other: &Token) -> bool {
        self.address == other.address
    }

    /// Matches a symbol (case-insensitive) or an address.
    pub fn matches(&self, key: &str) -> bool {
        self.symbol.eq_ignore_ascii_case(key) || self.address.eq_ignore_ascii_case(key)
    }
}
