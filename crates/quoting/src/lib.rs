//! Quote computation and the per-interaction session that drives it.
//!
//! [`QuoteEngine`] is pure: pool state and trade inputs in, [`Quote`] out.
//! [`QuoteSession`] sequences resolver, cache and engine for one user
//! interaction and guards against out-of-order fetch completions.
//!
//! [`Quote`]: oolong_domain::Quote

/// Pure quote computation.
pub mod engine;
/// Commonly used types.
pub mod prelude;
/// Session state machine.
pub mod session;

pub use engine::{QuoteConfig, QuoteEngine, QuoteRequest};
pub use session::{QuoteSession, SessionSnapshot, SessionState};
