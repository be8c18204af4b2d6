pub mod pool;
pub mod token;

// Re-export for easier access
pub use pool::{ParsePoolIdError, PoolDescriptor, PoolId, PoolState};
pub use token::Token;
