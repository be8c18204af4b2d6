//! Pure quote computation.
//!
//! The engine never looks at the clock or the network. Whoever hands it a
//! [`PoolState`] vouches for that state's freshness.

use anyhow::{Context, Result, bail};
use oolong_domain::math::fixed_point::{DEFAULT_SCALE, MAX_SCALE};
use oolong_domain::{
    ArithmeticError, Direction, FixedPointPrice, PoolState, Price, Quote, QuoteError, Token,
};
use rust_decimal::{Decimal, RoundingStrategy};
use std::env;
use std::str::FromStr;

/// Default number of fractional digits on output amounts.
pub const DEFAULT_DISPLAY_PRECISION: u32 = 4;

/// Configuration for the quote engine.
#[derive(Debug, Clone)]
pub struct QuoteConfig {
    /// Fractional digits kept when decoding and inverting pool prices.
    pub decimal_scale: u32,
    /// Fractional digits of the output amount.
    pub display_precision: u32,
    /// Upper leverage bound (inclusive). The lower bound is always 1.
    pub max_leverage: Decimal,
}

impl Default for QuoteConfig {
    fn default() -> Self {
        Self {
            decimal_scale: DEFAULT_SCALE,
            display_precision: DEFAULT_DISPLAY_PRECISION,
            max_leverage: Decimal::from(5),
        }
    }
}

impl QuoteConfig {
    /// Reads `QUOTE_DECIMAL_SCALE`, `QUOTE_DISPLAY_PRECISION` and
    /// `QUOTE_MAX_LEVERAGE`, falling back to the defaults for unset ones.
    ///
    /// # Errors
    /// Returns an error if a variable does not parse or the result is invalid.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(v) = env::var("QUOTE_DECIMAL_SCALE") {
            config.decimal_scale = v.parse().context("QUOTE_DECIMAL_SCALE must be an integer")?;
        }
        if let Ok(v) = env::var("QUOTE_DISPLAY_PRECISION") {
            config.display_precision = v
                .parse()
                .context("QUOTE_DISPLAY_PRECISION must be an integer")?;
        }
        if let Ok(v) = env::var("QUOTE_MAX_LEVERAGE") {
            config.max_leverage =
                Decimal::from_str(&v).context("QUOTE_MAX_LEVERAGE must be a decimal")?;
        }
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn with_decimal_scale(mut self, scale: u32) -> Self {
        self.decimal_scale = scale;
        self
    }

    #[must_use]
    pub fn with_display_precision(mut self, precision: u32) -> Self {
        self.display_precision = precision;
        self
    }

    #[must_use]
    pub fn with_max_leverage(mut self, max_leverage: Decimal) -> Self {
        self.max_leverage = max_leverage;
        self
    }

    /// Checks the bounds between the settings.
    ///
    /// # Errors
    /// Returns an error if the scale exceeds the decimal maximum, the display
    /// precision exceeds the scale, or the leverage cap is below 1.
    pub fn validate(&self) -> Result<()> {
        if self.decimal_scale > MAX_SCALE {
            bail!(
                "decimal scale {} exceeds the maximum of {MAX_SCALE}",
                self.decimal_scale
            );
        }
        if self.display_precision > self.decimal_scale {
            bail!(
                "display precision {} exceeds decimal scale {}",
                self.display_precision,
                self.decimal_scale
            );
        }
        if self.max_leverage < Decimal::ONE {
            bail!("max leverage {} is below 1", self.max_leverage);
        }
        Ok(())
    }
}

/// Trade inputs for a single quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub input_token: Token,
    pub output_token: Token,
    pub input_amount: Decimal,
    pub leverage: Decimal,
    pub direction: Direction,
    /// Whether `input_token` is the pool's token1.
    pub reversed: bool,
}

/// Computes leveraged output amounts from pool state.
#[derive(Debug, Clone)]
pub struct QuoteEngine {
    config: QuoteConfig,
    codec: FixedPointPrice,
}

impl Default for QuoteEngine {
    fn default() -> Self {
        Self {
            config: QuoteConfig::default(),
            codec: FixedPointPrice::default(),
        }
    }
}

impl QuoteEngine {
    /// Creates an engine from a validated configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: QuoteConfig) -> Result<Self> {
        config.validate()?;
        let codec = FixedPointPrice::new(config.decimal_scale)
            .map_err(|e| anyhow::anyhow!("decimal scale {}: {e}", config.decimal_scale))?;
        Ok(Self { config, codec })
    }

    pub fn config(&self) -> &QuoteConfig {
        &self.config
    }

    /// Rejects leverage outside `[1, max_leverage]`.
    ///
    /// # Errors
    /// Returns [`QuoteError::Range`] when out of bounds.
    pub fn check_leverage(&self, leverage: Decimal) -> Result<(), QuoteError> {
        if leverage < Decimal::ONE || leverage > self.config.max_leverage {
            return Err(QuoteError::Range {
                value: leverage,
                min: Decimal::ONE,
                max: self.config.max_leverage,
            });
        }
        Ok(())
    }

    /// Pool price oriented as output token per input token.
    ///
    /// # Errors
    /// Returns [`QuoteError::Arithmetic`] if decoding overflows or a reversed
    /// pair meets a zero price.
    pub fn effective_price(&self, state: &PoolState, reversed: bool) -> Result<Price, QuoteError> {
        let price = self.codec.decode(state.sqrt_price_x96)?;
        if reversed {
            Ok(self.codec.invert(price)?)
        } else {
            Ok(price)
        }
    }

    /// Computes a quote.
    ///
    /// Leverage is checked first. A non-positive input is an idle form and
    /// always quotes a zero output; its effective price is zero when the pool
    /// price cannot be represented in the requested orientation.
    ///
    /// # Errors
    /// Returns [`QuoteError::Range`] for out-of-bounds leverage and, for a
    /// positive input, [`QuoteError::Arithmetic`] when the price or product
    /// does not fit.
    pub fn quote(&self, state: &PoolState, request: &QuoteRequest) -> Result<Quote, QuoteError> {
        self.check_leverage(request.leverage)?;

        let (effective_price, raw_output) = if request.input_amount <= Decimal::ZERO {
            let price = self
                .effective_price(state, request.reversed)
                .unwrap_or(Price::new(Decimal::ZERO));
            (price, Decimal::ZERO)
        } else {
            let price = self.effective_price(state, request.reversed)?;
            let output = request
                .input_amount
                .checked_mul(price.value)
                .and_then(|v| v.checked_mul(request.leverage))
                .ok_or(ArithmeticError::Overflow)?;
            (price, output)
        };

        Ok(Quote {
            input_token: request.input_token.clone(),
            output_token: request.output_token.clone(),
            input_amount: request.input_amount,
            output_amount: self.round_for_display(raw_output),
            effective_price,
            leverage: request.leverage,
            direction: request.direction,
            reversed: request.reversed,
        })
    }

    /// Quotes the opposite direction, feeding the previous output back in as
    /// the new input. Equivalent to a fresh [`quote`](Self::quote) with the
    /// tokens swapped.
    ///
    /// Inverting twice returns the first output (within one rounding step
    /// each way) only at leverage 1; otherwise the leverage is applied twice
    /// and the output grows by the square of the leverage. Both cases are
    /// pinned by `tests::test_double_inversion` in this module.
    ///
    /// # Errors
    /// Same as [`quote`](Self::quote).
    pub fn invert(&self, quote: &Quote, state: &PoolState) -> Result<Quote, QuoteError> {
        let request = QuoteRequest {
            input_token: quote.output_token.clone(),
            output_token: quote.input_token.clone(),
            input_amount: quote.output_amount,
            leverage: quote.leverage,
            direction: quote.direction,
            reversed: !quote.reversed,
        };
        self.quote(state, &request)
    }

    fn round_for_display(&self, value: Decimal) -> Decimal {
        let precision = self.config.display_precision;
        let mut rounded =
            value.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(precision);
        rounded
    }
}
