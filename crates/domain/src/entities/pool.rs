use crate::entities::token::Token;
use crate::error::FetchError;
use crate::value_objects::price::SqrtPriceX96;
use alloy_primitives::{B256, hex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MIN_TICK_I24: i32 = -(1 << 23);
const MAX_TICK_I24: i32 = (1 << 23) - 1;
const MAX_FEE_U24: u32 = (1 << 24) - 1;

/// Opaque 32-byte pool identifier, rendered as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PoolId(pub B256);

/// Failure to parse a [`PoolId`] from hex.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid pool id `{0}`: expected 32 bytes of hex")]
pub struct ParsePoolIdError(pub String);

impl PoolId {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(B256::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0.0
    }

    /// Lowercase hex without the `0x` prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<B256> for PoolId {
    fn from(id: B256) -> Self {
        Self(id)
    }
}

impl FromStr for PoolId {
    type Err = ParsePoolIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        B256::from_str(s)
            .map(Self)
            .map_err(|_| ParsePoolIdError(s.to_string()))
    }
}

impl TryFrom<String> for PoolId {
    type Error = ParsePoolIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PoolId> for String {
    fn from(id: PoolId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PoolId({self})")
    }
}

/// A known pool with its canonical token order. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDescriptor {
    pub id: PoolId,
    pub token0: Token,
    pub token1: Token,
}

impl PoolDescriptor {
    /// Creates a descriptor, ordering the tokens by address (lower address is token0).
    pub fn new(id: PoolId, token_a: Token, token_b: Token) -> Self {
        let (token0, token1) = if token_a.address <= token_b.address {
            (token_a, token_b)
        } else {
            (token_b, token_a)
        };
        Self { id, token0, token1 }
    }

    /// Whether this pool trades exactly the unordered pair `{a, b}`.
    pub fn trades(&self, a: &Token, b: &Token) -> bool {
        (self.token0.same_as(a) && self.token1.same_as(b))
            || (self.token0.same_as(b) && self.token1.same_as(a))
    }
}

/// Snapshot of a pool's on-chain state. Never mutated after the fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub sqrt_price_x96: SqrtPriceX96,
    /// Signed 24-bit tick.
    pub tick: i32,
    pub protocol_fee: u32,
    pub lp_fee: u32,
    pub liquidity: u128,
    pub fetched_at: DateTime<Utc>,
}

impl PoolState {
    /// Builds a state stamped with the current time.
    ///
    /// # Errors
    /// Returns [`FetchError::Malformed`] if the tick is not a signed 24-bit
    /// value or a fee does not fit 24 bits.
    pub fn new(
        sqrt_price_x96: SqrtPriceX96,
        tick: i32,
        protocol_fee: u32,
        lp_fee: u32,
        liquidity: u128,
    ) -> Result<Self, FetchError> {
        if !(MIN_TICK_I24..=MAX_TICK_I24).contains(&tick) {
            return Err(FetchError::malformed(format!("tick {tick} out of int24 range")));
        }
        if protocol_fee > MAX_FEE_U24 || lp_fee > MAX_FEE_U24 {
            return Err(FetchError::malformed(format!(
                "fee out of uint24 range (protocol {protocol_fee}, lp {lp_fee})"
            )));
        }
        Ok(Self {
            sqrt_price_x96,
            tick,
            protocol_fee,
            lp_fee,
            liquidity,
            fetched_at: Utc::now(),
        })
    }

    /// Time elapsed since the fetch completed.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.fetched_at
    }
}
