use alloy::primitives::{Address, U256};
use fastnum::{UD64, UD128};

use crate::num;

/// What to do with the tokens once they are bought.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisposalPolicy {
    /// Sell the full balance back through the pool.
    SellBack,

    /// Transfer the full balance to the given address.
    TransferTo(Address),
}

/// Strategy of a single session.
///
/// Immutable while the session is watching, changing any of it requires
/// stopping the session and registering it again.
#[derive(Clone, derive_more::Debug, PartialEq)]
pub struct SniperConfig {
    /// Originator whose launches trigger the trades.
    pub tracked_address: Address,

    /// Amount of ETH spent on every buy.
    #[debug("{position_size_eth}")]
    pub position_size_eth: UD128,

    /// Maximum adverse price movement accepted by the buy and sell guards, in percent.
    #[debug("{slippage_percent}")]
    pub slippage_percent: UD64,

    /// Delay between the buy and the disposal.
    pub wait_seconds: Option<u64>,

    pub disposal: DisposalPolicy,
}

impl SniperConfig {
    /// Position size in wei.
    pub fn position_size_wei(&self) -> U256 {
        num::Converter::ether().to_unsigned(self.position_size_eth)
    }

    /// Configured wait, `None` when there is nothing to wait for.
    pub fn wait(&self) -> Option<std::time::Duration> {
        self.wait_seconds
            .filter(|s| *s > 0)
            .map(std::time::Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use fastnum::{udec64, udec128};

    use super::*;

    fn config(wait_seconds: Option<u64>) -> SniperConfig {
        SniperConfig {
            tracked_address: address!("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd"),
            position_size_eth: udec128!(0.05),
            slippage_percent: udec64!(10),
            wait_seconds,
            disposal: DisposalPolicy::SellBack,
        }
    }

    #[test]
    fn test_position_size_wei() {
        assert_eq!(
            config(None).position_size_wei(),
            U256::from(50_000_000_000_000_000u64)
        );
    }

    #[test]
    fn test_zero_wait_is_no_wait() {
        assert_eq!(config(None).wait(), None);
        assert_eq!(config(Some(0)).wait(), None);
        assert_eq!(
            config(Some(30)).wait(),
            Some(std::time::Duration::from_secs(30))
        );
    }
}
