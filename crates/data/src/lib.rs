//! Pool reference data and state caching.
//!
//! - [`PoolResolver`]: maps an unordered token pair to a known pool and its
//!   canonical token order.
//! - [`PoolStateCache`]: per-pool state cache with in-flight de-duplication.

/// Pool state cache.
pub mod cache;
/// Known-pool registry.
pub mod registry;

pub use cache::{CacheConfig, PoolStateCache};
pub use registry::{PoolEntry, PoolResolver, RegistryFile, Resolution};
