//! Uniswap v4 pool state adapter.
//!
//! v4 pools live inside a single `PoolManager`; their state is read through
//! the periphery `StateView` contract, keyed by the 32-byte pool id.

/// Pool state provider backed by `StateView`.
pub mod provider;
/// `StateView` ABI bindings and return-data decoding.
pub mod state_view;

pub use provider::{StateViewConfig, StateViewProvider};
pub use state_view::Slot0;
