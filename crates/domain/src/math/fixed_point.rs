//! Q64.96 square-root price codec.
//!
//! `price = (sqrtPriceX96 / 2^96)^2`, token1 per token0. The square is taken
//! on a 512-bit integer so the full 320-bit intermediate survives until the
//! single rounding step into a decimal.

use crate::error::ArithmeticError;
use crate::value_objects::price::{Price, SqrtPriceX96};
use primitive_types::{U256, U512};
use rust_decimal::{Decimal, RoundingStrategy};

/// Default number of fractional digits for decoded prices.
pub const DEFAULT_SCALE: u32 = 18;

/// Largest scale a [`Decimal`] can carry.
pub const MAX_SCALE: u32 = 28;

/// Largest mantissa a [`Decimal`] can carry (2^96 - 1).
const MAX_MANTISSA: u128 = (1u128 << 96) - 1;

/// Decoder/encoder between Q64.96 square-root prices and decimal prices.
///
/// The scale bounds the output precision. Prices too large for the decimal
/// mantissa at that scale lose fractional digits, one at a time, before
/// decoding gives up with [`ArithmeticError::Overflow`].
///
/// Supported range, given the 96-bit decimal mantissa:
/// - `sqrtPriceX96 < 2^144` (price below about 7.9e28) always decodes;
///   values from just under 2^144 up to 2^160 overflow.
/// - Prices below `10^-scale` decode to zero and cannot be inverted; at the
///   default scale that is every `sqrtPriceX96 < 2^66`, roughly.
/// - Decoding followed by two inversions reproduces the price to within a
///   relative 1e-8 for prices in `[2^-30, 2^30]` at the default scale.
///   Outside that band one side of the inversion runs out of digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPointPrice {
    scale: u32,
}

impl Default for FixedPointPrice {
    fn default() -> Self {
        Self {
            scale: DEFAULT_SCALE,
        }
    }
}

impl FixedPointPrice {
    /// Creates a codec with the given fractional digits.
    ///
    /// # Errors
    /// Returns [`ArithmeticError::Overflow`] if `scale` exceeds [`MAX_SCALE`].
    pub fn new(scale: u32) -> Result<Self, ArithmeticError> {
        if scale > MAX_SCALE {
            return Err(ArithmeticError::Overflow);
        }
        Ok(Self { scale })
    }

    #[must_use]
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Decodes a square-root price into token1-per-token0.
    ///
    /// # Errors
    /// Returns [`ArithmeticError::Overflow`] if the price does not fit a
    /// decimal even with no fractional digits.
    pub fn decode(&self, sqrt_price: SqrtPriceX96) -> Result<Price, ArithmeticError> {
        let root = U512::from(sqrt_price.as_u256());
        let squared = root * root;
        let q192 = U512::one() << 192;

        for scale in (0..=self.scale).rev() {
            let scaled = squared * U512::exp10(scale as usize);
            let mantissa = div_round_half_up(scaled, q192);
            if let Some(value) = to_decimal(mantissa, scale) {
                return Ok(Price::new(value));
            }
        }
        Err(ArithmeticError::Overflow)
    }

    /// Computes `1 / price` rounded half away from zero to the codec scale.
    ///
    /// # Errors
    /// Returns [`ArithmeticError::DivisionByZero`] for a zero price and
    /// [`ArithmeticError::Overflow`] if the inverse is not representable.
    pub fn invert(&self, price: Price) -> Result<Price, ArithmeticError> {
        if price.is_zero() {
            return Err(ArithmeticError::DivisionByZero);
        }
        let inverse = Decimal::ONE
            .checked_div(price.value)
            .ok_or(ArithmeticError::Overflow)?;
        Ok(Price::new(inverse.round_dp_with_strategy(
            self.scale,
            RoundingStrategy::MidpointAwayFromZero,
        )))
    }

    /// Encodes a token1-per-token0 price as `floor(sqrt(price) * 2^96)`.
    ///
    /// # Errors
    /// Returns [`ArithmeticError::Overflow`] for negative prices and prices
    /// whose square root does not fit 160 bits.
    pub fn encode(&self, price: Price) -> Result<SqrtPriceX96, ArithmeticError> {
        if price.value.is_sign_negative() && !price.is_zero() {
            return Err(ArithmeticError::Overflow);
        }
        let mantissa = U512::from(price.value.mantissa().unsigned_abs());
        let ratio_x192 = (mantissa << 192) / U512::exp10(price.value.scale() as usize);
        let root = isqrt(ratio_x192);
        if root.bits() > SqrtPriceX96::BITS {
            return Err(ArithmeticError::Overflow);
        }
        let high = U256::from((root >> 128).low_u128());
        let low = U256::from(root.low_u128());
        SqrtPriceX96::new((high << 128) | low)
    }
}

fn div_round_half_up(numerator: U512, denominator: U512) -> U512 {
    (numerator + (denominator >> 1)) / denominator
}

fn to_decimal(mantissa: U512, scale: u32) -> Option<Decimal> {
    if mantissa > U512::from(MAX_MANTISSA) {
        return None;
    }
    let mantissa = i128::try_from(mantissa.low_u128()).ok()?;
    Decimal::try_from_i128_with_scale(mantissa, scale).ok()
}

/// Floor square root by Newton iteration.
fn isqrt(n: U512) -> U512 {
    if n.is_zero() {
        return n;
    }
    let mut x = U512::one() << n.bits().div_ceil(2);
    loop {
        let y = (x + n / x) >> 1;
        if y >= x {
            return x;
        }
        x = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn sqrt(v: u128) -> SqrtPriceX96 {
        SqrtPriceX96::from(v)
    }

    #[test]
    fn test_decode_unit_price() {
        let codec = FixedPointPrice::default();
        let price = codec.decode(SqrtPriceX96::q96()).unwrap();
        assert_eq!(price.value, dec!(1));
        assert_eq!(price.to_string(), "1.000000000000000000");
    }

    #[test]
    fn test_decode_exact_squares() {
        let codec = FixedPointPrice::default();
        let q96 = 1u128 << 96;
        assert_eq!(codec.decode(sqrt(2 * q96)).unwrap().value, dec!(4));
        assert_eq!(codec.decode(sqrt(50 * q96)).unwrap().value, dec!(2500));
        assert_eq!(codec.decode(sqrt(q96 / 2)).unwrap().value, dec!(0.25));
        assert_eq!(codec.decode(sqrt(0)).unwrap().value, Decimal::ZERO);
    }

    #[test]
    fn test_decode_keeps_precision_beyond_f64() {
        // (1 + 2^-26)^2 = 1 + 2^-25 + 2^-52, exact to 28 digits.
        let codec = FixedPointPrice::new(28).unwrap();
        let price = codec.decode(sqrt((1u128 << 96) + (1u128 << 70))).unwrap();
        assert_eq!(price.value, dec!(1.0000000298023226097399174250));

        // (1 + 2^-96)^2 rounds back to exactly 1.
        let price = codec.decode(sqrt((1u128 << 96) + 1)).unwrap();
        assert_eq!(price.value, dec!(1));
    }

    #[test]
    fn test_decode_large_price_reduces_scale() {
        let codec = FixedPointPrice::default();
        let price = codec.decode(sqrt(1u128 << 120)).unwrap();
        assert_eq!(price.value, Decimal::from(1u128 << 48));

        // 2^80 needs 25 integer digits, leaving room for 4 fractional ones.
        let root = SqrtPriceX96::new(U256::one() << 136).unwrap();
        let price = codec.decode(root).unwrap();
        assert_eq!(price.value, Decimal::from(1u128 << 80));
        assert!(price.value.scale() <= 4);
    }

    #[test]
    fn test_decode_overflow() {
        let codec = FixedPointPrice::default();
        let max = SqrtPriceX96::new((U256::one() << 160) - U256::one()).unwrap();
        assert_eq!(codec.decode(max), Err(ArithmeticError::Overflow));
    }

    #[test]
    fn test_decode_range_boundaries() {
        let codec = FixedPointPrice::default();
        let pow = |bits: usize| SqrtPriceX96::new(U256::one() << bits).unwrap();

        // 2^143 squares to 2^94, which only fits with no fractional digits.
        let price = codec.decode(pow(143)).unwrap();
        assert_eq!(price.value, Decimal::from(1u128 << 94));
        assert_eq!(price.value.scale(), 0);

        for bits in [144, 150, 159] {
            assert_eq!(codec.decode(pow(bits)), Err(ArithmeticError::Overflow));
        }

        // 2^66 squares to 2^-60 ~ 8.7e-19, the smallest price that survives 18 digits.
        let price = codec.decode(pow(66)).unwrap();
        assert_eq!(price.value, dec!(0.000000000000000001));
        assert!(codec.invert(price).is_ok());

        let price = codec.decode(pow(65)).unwrap();
        assert!(price.is_zero());
        assert_eq!(codec.invert(price), Err(ArithmeticError::DivisionByZero));
    }

    #[test]
    fn test_invert() {
        let codec = FixedPointPrice::default();
        assert_eq!(codec.invert(Price::new(dec!(4))).unwrap().value, dec!(0.25));
        assert_eq!(
            codec.invert(Price::new(dec!(3))).unwrap().value,
            dec!(0.333333333333333333)
        );
        assert_eq!(
            codec.invert(Price::new(dec!(1.5))).unwrap().value,
            dec!(0.666666666666666667)
        );
        assert_eq!(
            codec.invert(Price::new(Decimal::ZERO)),
            Err(ArithmeticError::DivisionByZero)
        );
    }

    #[test]
    fn test_scale_is_configurable() {
        let codec = FixedPointPrice::new(6).unwrap();
        assert_eq!(codec.invert(Price::new(dec!(3))).unwrap().value, dec!(0.333333));
        assert_eq!(FixedPointPrice::new(29), Err(ArithmeticError::Overflow));
    }

    #[test]
    fn test_encode() {
        let codec = FixedPointPrice::default();
        assert_eq!(codec.encode(Price::new(dec!(1))).unwrap(), SqrtPriceX96::q96());
        assert_eq!(
            codec.encode(Price::new(dec!(4))).unwrap(),
            sqrt(2 * (1u128 << 96))
        );
        assert_eq!(codec.encode(Price::new(Decimal::ZERO)).unwrap(), sqrt(0));
        assert_eq!(
            codec.encode(Price::new(dec!(-1))),
            Err(ArithmeticError::Overflow)
        );

        let price = Price::new(dec!(2500.5));
        let decoded = codec.decode(codec.encode(price).unwrap()).unwrap();
        assert!((decoded.value - price.value).abs() < dec!(0.000000000001));
    }

    proptest! {
        // Prices in [2^-30, 2^30].
        #[test]
        fn prop_double_inversion_reproduces_price(raw in (1u128 << 81)..(1u128 << 111)) {
            let codec = FixedPointPrice::default();
            let price = codec.decode(sqrt(raw)).unwrap();
            let back = codec.invert(codec.invert(price).unwrap()).unwrap();
            let tolerance = price.value * dec!(0.00000001) + dec!(0.000000000000000001);
            prop_assert!((back.value - price.value).abs() <= tolerance);
        }

        #[test]
        fn prop_decode_total_below_2_pow_143(hi in 0u128..(1u128 << 15), lo in any::<u128>()) {
            let codec = FixedPointPrice::default();
            let raw = (U256::from(hi) << 128) | U256::from(lo);
            prop_assert!(codec.decode(SqrtPriceX96::new(raw).unwrap()).is_ok());
        }

        #[test]
        fn prop_decode_overflows_from_2_pow_144(hi in (1u128 << 16)..(1u128 << 32), lo in any::<u128>()) {
            let codec = FixedPointPrice::default();
            let raw = (U256::from(hi) << 128) | U256::from(lo);
            prop_assert_eq!(
                codec.decode(SqrtPriceX96::new(raw).unwrap()),
                Err(ArithmeticError::Overflow)
            );
        }

        #[test]
        fn prop_decode_is_monotonic(a in 0u128..(1u128 << 111), b in 0u128..(1u128 << 111)) {
            let codec = FixedPointPrice::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let p_lo = codec.decode(sqrt(lo)).unwrap();
            let p_hi = codec.decode(sqrt(hi)).unwrap();
            prop_assert!(p_lo.value <= p_hi.value);
        }
    }
}
