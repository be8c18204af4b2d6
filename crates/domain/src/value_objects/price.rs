use crate::error::ArithmeticError;
use primitive_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A plain decimal price. Inversion lives in
/// [`FixedPointPrice`](crate::math::fixed_point::FixedPointPrice) so the
/// precision policy stays in one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Price {
    pub value: Decimal,
}

impl Price {
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }
}

impl From<Decimal> for Price {
    fn from(value: Decimal) -> Self {
        Self { value }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

/// Square root of the token1/token0 ratio in Q64.96 fixed point.
/// Always below 2^160.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "U256", into = "U256")]
pub struct SqrtPriceX96(U256);

impl SqrtPriceX96 {
    /// Number of bits the value may occupy.
    pub const BITS: usize = 160;

    /// Wraps a raw value.
    ///
    /// # Errors
    /// Returns [`ArithmeticError::Overflow`] if the value needs more than 160 bits.
    pub fn new(raw: U256) -> Result<Self, ArithmeticError> {
        if raw.bits() > Self::BITS {
            return Err(ArithmeticError::Overflow);
        }
        Ok(Self(raw))
    }

    /// 2^96, the encoding of price 1.
    pub fn q96() -> Self {
        Self(U256::one() << 96)
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl From<u128> for SqrtPriceX96 {
    fn from(v: u128) -> Self {
        Self(U256::from(v))
    }
}

impl TryFrom<U256> for SqrtPriceX96 {
    type Error = ArithmeticError;

    fn try_from(raw: U256) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<SqrtPriceX96> for U256 {
    fn from(v: SqrtPriceX96) -> Self {
        v.0
    }
}

impl fmt::Display for SqrtPriceX96 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqrt_price_bounds() {
        let max = (U256::one() << 160) - U256::one();
        assert!(SqrtPriceX96::new(max).is_ok());
        assert_eq!(
            SqrtPriceX96::new(U256::one() << 160),
            Err(ArithmeticError::Overflow)
        );
        assert_eq!(
            SqrtPriceX96::q96().to_string(),
            "79228162514264337593543950336"
        );
    }
}
