//! Core domain model for the pool quote engine.
//!
//! This crate holds the reference data (tokens, pool descriptors), the
//! fetched pool state, the derived quote and the fixed-point price codec
//! every other crate funnels price interpretation through.

/// Pool and token entities.
pub mod entities;
/// Trade enums.
pub mod enums;
/// Error taxonomy.
pub mod error;
/// Fixed-point price math.
pub mod math;
/// Value objects.
pub mod value_objects;

pub use entities::{PoolDescriptor, PoolId, PoolState, Token};
pub use enums::{Direction, TokenRole};
pub use error::{ArithmeticError, FetchError, QuoteError};
pub use math::fixed_point::FixedPointPrice;
pub use value_objects::{Price, Quote, SqrtPriceX96};
