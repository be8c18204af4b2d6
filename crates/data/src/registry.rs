//! Static registry of known pools and the pair resolver built on it.

use anyhow::{Context, Result, bail};
use oolong_domain::{PoolDescriptor, PoolId, QuoteError, Token};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// On-disk registry format.
///
/// ```json
/// {
///   "tokens": [{ "address": "0x…", "symbol": "ETH", "name": "Ethereum" }],
///   "pools":  [{ "pool_id": "0x…", "token0": "0x…", "token1": "0x…" }]
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    pub tokens: Vec<Token>,
    pub pools: Vec<PoolEntry>,
}

/// A pool entry; tokens are referenced by address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolEntry {
    pub pool_id: PoolId,
    pub token0: String,
    pub token1: String,
}

/// Result of resolving a user-ordered pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub pool: PoolDescriptor,
    /// `true` when the user's input token is the pool's token1.
    pub reversed: bool,
}

/// Resolves token pairs against a fixed set of known pools. No I/O.
#[derive(Debug, Clone, Default)]
pub struct PoolResolver {
    tokens: Vec<Token>,
    pools: Vec<PoolDescriptor>,
}

impl PoolResolver {
    pub fn new(tokens: Vec<Token>, pools: Vec<PoolDescriptor>) -> Self {
        Self { tokens, pools }
    }

    /// Builds a resolver from a registry, normalising addresses and
    /// canonical token order.
    ///
    /// # Errors
    /// Returns an error on duplicate token addresses, pools referencing
    /// unknown tokens, or pools pairing a token with itself.
    pub fn from_registry(registry: RegistryFile) -> Result<Self> {
        let mut tokens: Vec<Token> = Vec::with_capacity(registry.tokens.len());
        for token in registry.tokens {
            let token = Token::new(token.address, token.symbol, token.name);
            if tokens.iter().any(|t| t.same_as(&token)) {
                bail!("duplicate token address {}", token.address);
            }
            tokens.push(token);
        }

        let lookup = |address: &str| -> Result<Token> {
            tokens
                .iter()
                .find(|t| t.address.eq_ignore_ascii_case(address))
                .cloned()
                .with_context(|| format!("unknown token address {address}"))
        };

        let mut pools = Vec::with_capacity(registry.pools.len());
        for entry in registry.pools {
            let token0 = lookup(&entry.token0).with_context(|| format!("pool {}", entry.pool_id))?;
            let token1 = lookup(&entry.token1).with_context(|| format!("pool {}", entry.pool_id))?;
            if token0.same_as(&token1) {
                bail!("pool {} pairs {} with itself", entry.pool_id, token0.symbol);
            }
            pools.push(PoolDescriptor::new(entry.pool_id, token0, token1));
        }

        Ok(Self::new(tokens, pools))
    }

    /// Parses a JSON registry.
    ///
    /// # Errors
    /// Returns an error if the JSON is invalid or the registry inconsistent.
    pub fn from_json(json: &str) -> Result<Self> {
        let registry: RegistryFile =
            serde_json::from_str(json).context("failed to parse pool registry")?;
        Self::from_registry(registry)
    }

    /// Loads a JSON registry from disk.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read pool registry {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn pools(&self) -> &[PoolDescriptor] {
        &self.pools
    }

    /// Finds a token by symbol (case-insensitive) or address.
    pub fn token(&self, key: &str) -> Option<&Token> {
        self.tokens.iter().find(|t| t.matches(key))
    }

    /// Resolves the pool trading `{token_a, token_b}`.
    ///
    /// `reversed` is set when `token_a` is not the pool's token0. The first
    /// registered pool for a pair wins.
    ///
    /// # Errors
    /// [`QuoteError::InvalidPair`] if both tokens are the same,
    /// [`QuoteError::NotFound`] if no pool trades the pair.
    pub fn resolve(&self, token_a: &Token, token_b: &Token) -> Result<Resolution, QuoteError> {
        if token_a.same_as(token_b) {
            return Err(QuoteError::InvalidPair(token_a.symbol.clone()));
        }
        let pool = self
            .pools
            .iter()
            .find(|p| p.trades(token_a, token_b))
            .ok_or_else(|| QuoteError::NotFound {
                token_a: token_a.symbol.clone(),
                token_b: token_b.symbol.clone(),
            })?;
        let reversed = !token_a.same_as(&pool.token0);
        debug!(pool_id = %pool.id, reversed, "Resolved pair");
        Ok(Resolution {
            pool: pool.clone(),
            reversed,
        })
    }
}
