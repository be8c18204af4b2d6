//! Prelude module for convenient imports.
//!
//! # Example
//!
//! ```rust
//! use oolong_protocols::prelude::*;
//! ```

pub use crate::PoolStateProvider;
pub use crate::rpc::{RpcConfig, RpcProvider};
pub use crate::uniswap_v4::{StateViewConfig, StateViewProvider};
