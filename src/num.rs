use alloy::primitives::U256;
use fastnum::{
    UD64, bint,
    decimal::{Context, RoundingMode, UnsignedDecimal},
};

/// Decimals of the native asset.
pub const ETH_DECIMALS: u8 = 18;

/// Basis points in 100%.
const BPS_DENOMINATOR: u64 = 10_000;

/// Fixed-point to decimal converter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Converter {
    decimals: i32,
}

impl Converter {
    pub fn new(decimals: u8) -> Self {
        Self {
            decimals: decimals as i32,
        }
    }

    /// Converter between ETH and wei.
    pub fn ether() -> Self {
        Self::new(ETH_DECIMALS)
    }

    /// Saturates at the largest `UnsignedDecimal<N>` when `value` does not fit.
    pub fn from_unsigned<const N: usize>(&self, value: U256) -> UnsignedDecimal<N> {
        let unscaled =
            bint::UInt::<N>::from_le_slice(value.as_le_slice()).unwrap_or(bint::UInt::<N>::MAX);
        UnsignedDecimal::<N>::from_parts(
            unscaled,
            -self.decimals,
            Context::default().with_rounding_mode(RoundingMode::Floor),
        )
    }

    pub fn to_unsigned<const N: usize>(&self, value: UnsignedDecimal<N>) -> U256 {
        let rescaled = value.rescale(self.decimals as i16);
        U256::from_le_slice(rescaled.digits().to_radix_le(256).as_slice())
    }
}

/// Minimum acceptable output of a trade quoted at `expected`,
/// tolerating `slippage_percent` of adverse movement.
///
/// Slippage is applied with basis point precision and saturates at 100%.
pub fn apply_slippage(expected: U256, slippage_percent: UD64) -> U256 {
    let denominator = U256::from(BPS_DENOMINATOR);
    let bps = Converter::new(2)
        .to_unsigned(slippage_percent)
        .min(denominator);
    let keep = denominator - bps;
    expected
        .checked_mul(keep)
        .map(|v| v / denominator)
        .unwrap_or_else(|| expected / denominator * keep)
}
