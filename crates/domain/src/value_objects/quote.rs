use crate::entities::token::Token;
use crate::enums::Direction;
use crate::value_objects::price::Price;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A derived quote. Superseded, never mutated, when any input changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub input_token: Token,
    pub output_token: Token,
    pub input_amount: Decimal,
    /// Rounded to the engine's display precision.
    pub output_amount: Decimal,
    /// Always `output_token` per `input_token`.
    pub effective_price: Price,
    pub leverage: Decimal,
    pub direction: Direction,
    /// Whether the pool price had to be inverted to reach this orientation.
    pub reversed: bool,
}
