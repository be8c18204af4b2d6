use alloy_primitives::hex;
use alloy_sol_types::{SolCall, sol};
use oolong_domain::{FetchError, PoolId, SqrtPriceX96};
use primitive_types::U256;

sol! {
    /// Read-only view over `PoolManager` storage.
    interface IStateView {
        function getSlot0(bytes32 poolId)
            external
            view
            returns (uint160 sqrtPriceX96, int24 tick, uint24 protocolFee, uint24 lpFee);

        function getLiquidity(bytes32 poolId) external view returns (uint128 liquidity);
    }
}

pub use IStateView::{getLiquidityCall, getSlot0Call};

/// Decoded `getSlot0` return values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot0 {
    pub sqrt_price_x96: SqrtPriceX96,
    pub tick: i32,
    pub protocol_fee: u32,
    pub lp_fee: u32,
}

/// `0x`-prefixed calldata for `getSlot0(poolId)`.
pub fn encode_slot0_call(pool_id: &PoolId) -> String {
    hex::encode_prefixed(getSlot0Call { poolId: pool_id.0 }.abi_encode())
}

/// `0x`-prefixed calldata for `getLiquidity(poolId)`.
pub fn encode_liquidity_call(pool_id: &PoolId) -> String {
    hex::encode_prefixed(getLiquidityCall { poolId: pool_id.0 }.abi_encode())
}

/// Decodes `getSlot0` return data. Words must be canonically encoded for
/// their declared widths.
pub fn decode_slot0(data: &str) -> Result<Slot0, FetchError> {
    let ret = getSlot0Call::abi_decode_returns_validate(&return_bytes(data)?)
        .map_err(|e| FetchError::malformed(format!("getSlot0 return data: {e}")))?;

    let sqrt = U256::from_big_endian(&ret.sqrtPriceX96.to_be_bytes::<20>());
    let sqrt_price_x96 = SqrtPriceX96::new(sqrt)
        .map_err(|_| FetchError::malformed("sqrtPriceX96 exceeds 160 bits"))?;
    let tick = i32::try_from(ret.tick).map_err(|e| FetchError::malformed(e.to_string()))?;
    let protocol_fee =
        u32::try_from(ret.protocolFee).map_err(|e| FetchError::malformed(e.to_string()))?;
    let lp_fee = u32::try_from(ret.lpFee).map_err(|e| FetchError::malformed(e.to_string()))?;

    Ok(Slot0 {
        sqrt_price_x96,
        tick,
        protocol_fee,
        lp_fee,
    })
}

/// Decodes `getLiquidity` return data.
pub fn decode_liquidity(data: &str) -> Result<u128, FetchError> {
    getLiquidityCall::abi_decode_returns_validate(&return_bytes(data)?)
        .map_err(|e| FetchError::malformed(format!("getLiquidity return data: {e}")))
}

fn return_bytes(data: &str) -> Result<Vec<u8>, FetchError> {
    hex::decode(data).map_err(|e| FetchError::malformed(format!("invalid return data hex: {e}")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_primitives::U256 as Word;

    pub(crate) fn word(v: u128) -> String {
        hex::encode(Word::from(v).to_be_bytes::<32>())
    }

    pub(crate) fn shifted_word(bits: usize) -> String {
        hex::encode((Word::from(1u64) << bits).to_be_bytes::<32>())
    }

    /// Sign-extended two's complement of `-v`.
    pub(crate) fn neg_word(v: u64) -> String {
        hex::encode((Word::MAX - Word::from(v) + Word::from(1u64)).to_be_bytes::<32>())
    }

    #[test]
    fn test_selectors() {
        assert_eq!(hex::encode(getSlot0Call::SELECTOR), "c815641c");
        assert_eq!(hex::encode(getLiquidityCall::SELECTOR), "fa6793d5");
    }

    #[test]
    fn test_encode_call() {
        let id: PoolId = format!("0x{}", "ab".repeat(32)).parse().unwrap();
        let data = encode_slot0_call(&id);
        assert_eq!(data.len(), 2 + 8 + 64);
        assert!(data.starts_with("0xc815641cabab"));
        assert!(encode_liquidity_call(&id).starts_with("0xfa6793d5abab"));
    }

    #[test]
    fn test_decode_slot0() {
        let data = format!(
            "0x{}{}{}{}",
            shifted_word(96),
            neg_word(887_272),
            word(0),
            word(3000),
        );
        let slot0 = decode_slot0(&data).unwrap();
        assert_eq!(slot0.sqrt_price_x96, SqrtPriceX96::q96());
        assert_eq!(slot0.tick, -887_272);
        assert_eq!(slot0.protocol_fee, 0);
        assert_eq!(slot0.lp_fee, 3000);
    }

    #[test]
    fn test_decode_int24_bounds() {
        let slot0 = |tick: String| format!("0x{}{tick}{}{}", shifted_word(96), word(0), word(0));

        assert_eq!(decode_slot0(&slot0(word((1 << 23) - 1))).unwrap().tick, 8_388_607);
        assert_eq!(decode_slot0(&slot0(neg_word(1 << 23))).unwrap().tick, -8_388_608);
        assert!(decode_slot0(&slot0(word(1 << 23))).is_err());
        // Not sign-extended.
        assert!(decode_slot0(&slot0(word(0xff_ffff))).is_err());
    }

    #[test]
    fn test_decode_liquidity() {
        let data = format!("0x{}", word(u128::MAX));
        assert_eq!(decode_liquidity(&data), Ok(u128::MAX));

        let data = format!("0x{}", shifted_word(128));
        assert!(matches!(decode_liquidity(&data), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_short_or_bad_data() {
        assert!(matches!(decode_slot0("0x"), Err(FetchError::Malformed(_))));
        assert!(matches!(decode_liquidity("0x1234"), Err(FetchError::Malformed(_))));
        let bad = format!("0x{}", "zz".repeat(32));
        assert!(matches!(decode_liquidity(&bad), Err(FetchError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_wide_sqrt_price() {
        let data = format!("0x{}{}{}{}", shifted_word(160), word(0), word(0), word(0));
        assert!(matches!(decode_slot0(&data), Err(FetchError::Malformed(_))));
    }
}
