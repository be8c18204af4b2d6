//! Error types shared across the quote pipeline.

use rust_decimal::Decimal;
use std::time::Duration;

/// Arithmetic failures raised by the fixed-point price codec and the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArithmeticError {
    /// Inversion of a zero price.
    #[error("division by zero")]
    DivisionByZero,
    /// A value does not fit the target representation.
    #[error("arithmetic overflow")]
    Overflow,
}

/// Failure to obtain a pool's state from the chain-data provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Transport or provider-side failure.
    #[error("network error: {0}")]
    Network(String),
    /// The provider answered, but the payload could not be interpreted.
    #[error("malformed response: {0}")]
    Malformed(String),
    /// The fetch did not complete within the deadline.
    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),
}

impl FetchError {
    /// Creates a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a malformed-response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::Malformed(msg.into())
    }
}

/// Errors surfaced to the caller of the quote pipeline.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuoteError {
    /// The same token was selected as input and output.
    #[error("invalid pair: {0} selected on both sides")]
    InvalidPair(String),
    /// No registered pool trades the pair.
    #[error("no pool found for {token_a}/{token_b}")]
    NotFound {
        /// First token of the requested pair.
        token_a: String,
        /// Second token of the requested pair.
        token_b: String,
    },
    /// Pool state could not be fetched.
    #[error("pool state unavailable: {0}")]
    Fetch(#[from] FetchError),
    /// Leverage outside the accepted bounds.
    #[error("leverage {value} outside [{min}, {max}]")]
    Range {
        /// Rejected leverage.
        value: Decimal,
        /// Lower bound.
        min: Decimal,
        /// Upper bound.
        max: Decimal,
    },
    /// Arithmetic failure while computing the quote.
    #[error(transparent)]
    Arithmetic(#[from] ArithmeticError),
}
