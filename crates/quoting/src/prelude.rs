//! Prelude module for convenient imports.
//!
//! # Example
//!
//! ```rust
//! use oolong_quoting::prelude::*;
//! ```

pub use crate::engine::{QuoteConfig, QuoteEngine, QuoteRequest};
pub use crate::session::{QuoteSession, SessionSnapshot, SessionState};
pub use oolong_data::{CacheConfig, PoolResolver, PoolStateCache};
pub use oolong_domain::{Direction, Quote, QuoteError, Token, TokenRole};
