use super::state_view::{decode_liquidity, decode_slot0, encode_liquidity_call, encode_slot0_call};
use crate::PoolStateProvider;
use crate::rpc::RpcProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use oolong_domain::{FetchError, PoolId, PoolState};
use std::env;
use std::sync::Arc;
use tracing::{debug, warn};

/// Configuration for the `StateView` reader.
#[derive(Debug, Clone)]
pub struct StateViewConfig {
    /// `StateView` contract address.
    pub address: String,
    /// Block tag the calls are evaluated at.
    pub block_tag: String,
}

impl StateViewConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            block_tag: "latest".to_string(),
        }
    }

    /// Reads `STATE_VIEW_ADDRESS` and the optional `RPC_BLOCK_TAG`.
    ///
    /// # Errors
    /// Returns an error if `STATE_VIEW_ADDRESS` is unset.
    pub fn from_env() -> Result<Self> {
        let address = env::var("STATE_VIEW_ADDRESS")
            .context("STATE_VIEW_ADDRESS must be set in .env or environment")?;
        let mut config = Self::new(address);
        if let Ok(tag) = env::var("RPC_BLOCK_TAG") {
            config.block_tag = tag;
        }
        Ok(config)
    }
}

/// Reads pool state from a Uniswap v4 `StateView` contract.
pub struct StateViewProvider {
    rpc: Arc<RpcProvider>,
    config: StateViewConfig,
}

impl StateViewProvider {
    pub fn new(rpc: Arc<RpcProvider>, config: StateViewConfig) -> Self {
        Self { rpc, config }
    }
}

#[async_trait]
impl PoolStateProvider for StateViewProvider {
    async fn fetch_pool_state(&self, pool_id: &PoolId) -> Result<PoolState, FetchError> {
        let slot0_call = encode_slot0_call(pool_id);
        let liquidity_call = encode_liquidity_call(pool_id);

        let (slot0, liquidity) = tokio::try_join!(
            self.rpc
                .eth_call(&self.config.address, &slot0_call, &self.config.block_tag),
            self.rpc
                .eth_call(&self.config.address, &liquidity_call, &self.config.block_tag),
        )?;

        let slot0 = decode_slot0(&slot0)?;
        let liquidity = decode_liquidity(&liquidity)?;

        // StateView returns zeroes for pools the manager has never initialised.
        if slot0.sqrt_price_x96.is_zero() {
            warn!(pool_id = %pool_id, "Pool is not initialized");
            return Err(FetchError::malformed(format!(
                "pool {pool_id} is not initialized"
            )));
        }

        debug!(
            pool_id = %pool_id,
            sqrt_price_x96 = %slot0.sqrt_price_x96,
            tick = slot0.tick,
            liquidity,
            "Fetched pool state"
        );

        PoolState::new(
            slot0.sqrt_price_x96,
            slot0.tick,
            slot0.protocol_fee,
            slot0.lp_fee,
            liquidity,
        )
    }
}
