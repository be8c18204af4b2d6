//! Chain-data adapters.
//!
//! The quote pipeline needs exactly one outbound read: the state of a pool
//! by identifier. [`PoolStateProvider`] is that seam; [`uniswap_v4`] reads it
//! from a `StateView` contract over JSON-RPC.

/// Prelude module for convenient imports.
pub mod prelude;
/// Minimal JSON-RPC client.
pub mod rpc;
/// Uniswap v4 `StateView` adapter.
pub mod uniswap_v4;

use async_trait::async_trait;
use oolong_domain::{FetchError, PoolId, PoolState};

/// Reads a pool's current state.
///
/// Implementations must report failures as [`FetchError`] and never return a
/// placeholder state for a pool that does not exist.
#[async_trait]
pub trait PoolStateProvider: Send + Sync {
    async fn fetch_pool_state(&self, pool_id: &PoolId) -> Result<PoolState, FetchError>;
}
