//! Strategy setup dialog.
//!
//! The front-end collects a [`SniperConfig`] one field at a time. Which field
//! the next user input answers is a [`SetupStep`], and [`SetupStep::next`] is
//! the transition table between them. [`SetupDraft::apply`] validates one
//! input; a rejected input keeps the dialog on the same step.

use alloy::primitives::Address;
use fastnum::{UD64, UD128, decimal::Context, udec64};
use itertools::Itertools;

use crate::{
    error::ValidationError,
    types::{DisposalPolicy, SniperConfig},
};

/// Field the next user input answers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetupStep {
    Slippage,
    TrackedAddress,
    WaitTime,
    PositionSize,
    Disposal,
    Confirm,
}

impl SetupStep {
    pub const FIRST: Self = Self::Slippage;

    /// Step following this one, `None` after the confirmation.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Slippage => Some(Self::TrackedAddress),
            Self::TrackedAddress => Some(Self::WaitTime),
            Self::WaitTime => Some(Self::PositionSize),
            Self::PositionSize => Some(Self::Disposal),
            Self::Disposal => Some(Self::Confirm),
            Self::Confirm => None,
        }
    }

    pub fn prompt(self) -> &'static str {
        match self {
            Self::Slippage => "Enter slippage percentage (e.g., 10 for 10%):",
            Self::TrackedAddress => "Enter the address to track (developer's public key):",
            Self::WaitTime => {
                "Enter wait time in seconds before disposing (optional, enter 0 for none):"
            }
            Self::PositionSize => "Enter position size in ETH:",
            Self::Disposal => {
                "Enter an address to transfer bought tokens to, or 'sell' to sell them back:"
            }
            Self::Confirm => "Confirm setup? (yes/no)",
        }
    }
}

/// Result of applying one input.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    Next(SetupStep),
    Complete(SniperConfig),
    Cancelled,
}

/// Strategy fields collected so far.
#[derive(Clone, Debug, Default)]
pub struct SetupDraft {
    slippage_percent: Option<UD64>,
    tracked_address: Option<Address>,
    wait_seconds: Option<u64>,
    position_size_eth: Option<UD128>,
    disposal: Option<DisposalPolicy>,
}

impl SetupDraft {
    /// Validates `input` as the answer to `step` and records it.
    pub fn apply(&mut self, step: SetupStep, input: &str) -> Result<Transition, ValidationError> {
        let input = input.trim();
        match step {
            SetupStep::Slippage => {
                let slippage = UD64::from_str(input, Context::default())
                    .ok()
                    .filter(|s| *s <= udec64!(100))
                    .ok_or(ValidationError::Slippage)?;
                self.slippage_percent = Some(slippage);
            }
            SetupStep::TrackedAddress => {
                self.tracked_address = Some(parse_address(input)?);
            }
            SetupStep::WaitTime => {
                let wait: u64 = input.parse().map_err(|_| ValidationError::WaitTime)?;
                self.wait_seconds = Some(wait).filter(|w| *w > 0);
            }
            SetupStep::PositionSize => {
                let size = UD128::from_str(input, Context::default())
                    .ok()
                    .filter(|s| !s.is_zero())
                    .ok_or(ValidationError::PositionSize)?;
                self.position_size_eth = Some(size);
            }
            SetupStep::Disposal => {
                self.disposal = Some(if input.is_empty() || input.eq_ignore_ascii_case("sell") {
                    DisposalPolicy::SellBack
                } else {
                    DisposalPolicy::TransferTo(parse_address(input)?)
                });
            }
            SetupStep::Confirm => {
                return match input.to_ascii_lowercase().as_str() {
                    "yes" | "y" => self
                        .build()
                        .map(Transition::Complete)
                        .ok_or(ValidationError::Confirmation),
                    "no" | "n" => Ok(Transition::Cancelled),
                    _ => Err(ValidationError::Confirmation),
                };
            }
        }
        Ok(step
            .next()
            .map(Transition::Next)
            .unwrap_or(Transition::Cancelled))
    }

    /// Human readable summary shown before the confirmation.
    pub fn summary(&self) -> String {
        fn field<T: std::fmt::Display>(value: Option<T>) -> String {
            value.map_or_else(|| "-".to_string(), |v| v.to_string())
        }
        let disposal = match self.disposal {
            Some(DisposalPolicy::SellBack) => "sell back".to_string(),
            Some(DisposalPolicy::TransferTo(to)) => format!("transfer to {to}"),
            None => "-".to_string(),
        };
        [
            format!("Tracked address: {}", field(self.tracked_address)),
            format!("Position size: {} ETH", field(self.position_size_eth)),
            format!("Slippage: {}%", field(self.slippage_percent)),
            format!("Wait: {}s", self.wait_seconds.unwrap_or_default()),
            format!("Disposal: {disposal}"),
        ]
        .iter()
        .join("\n")
    }

    fn build(&self) -> Option<SniperConfig> {
        Some(SniperConfig {
            tracked_address: self.tracked_address?,
            position_size_eth: self.position_size_eth?,
            slippage_percent: self.slippage_percent?,
            wait_seconds: self.wait_seconds,
            disposal: self.disposal?,
        })
    }
}

fn parse_address(input: &str) -> Result<Address, ValidationError> {
    input.parse().map_err(|_| ValidationError::Address)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::address;
    use fastnum::udec128;

    use super::*;

    const ANSWERS: [(SetupStep, &str); 5] = [
        (SetupStep::Slippage, "12.5"),
        (SetupStep::TrackedAddress, "0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD"),
        (SetupStep::WaitTime, "0"),
        (SetupStep::PositionSize, "0.05"),
        (SetupStep::Disposal, "sell"),
    ];

    #[test]
    fn test_dialog_walks_every_step() {
        let mut draft = SetupDraft::default();
        let mut step = SetupStep::FIRST;
        for (expected, answer) in ANSWERS {
            assert_eq!(step, expected);
            match draft.apply(step, answer).unwrap() {
                Transition::Next(next) => step = next,
                other => panic!("unexpected transition {other:?}"),
            }
        }
        assert_eq!(step, SetupStep::Confirm);
        assert!(draft.summary().contains("Slippage: 12.5%"));

        assert_eq!(
            draft.apply(step, "YES").unwrap(),
            Transition::Complete(SniperConfig {
                tracked_address: address!("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd"),
                position_size_eth: udec128!(0.05),
                slippage_percent: udec64!(12.5),
                wait_seconds: None,
                disposal: DisposalPolicy::SellBack,
            })
        );
    }

    #[test]
    fn test_invalid_input_keeps_step() {
        let mut draft = SetupDraft::default();
        assert_eq!(
            draft.apply(SetupStep::Slippage, "ten"),
            Err(ValidationError::Slippage)
        );
        assert_eq!(
            draft.apply(SetupStep::Slippage, "101"),
            Err(ValidationError::Slippage)
        );
        assert_eq!(
            draft.apply(SetupStep::TrackedAddress, "0x1234"),
            Err(ValidationError::Address)
        );
        assert_eq!(
            draft.apply(SetupStep::WaitTime, "-1"),
            Err(ValidationError::WaitTime)
        );
        assert_eq!(
            draft.apply(SetupStep::PositionSize, "0"),
            Err(ValidationError::PositionSize)
        );
        assert_eq!(
            draft.apply(SetupStep::Confirm, "maybe"),
            Err(ValidationError::Confirmation)
        );
    }

    #[test]
    fn test_transfer_disposal_and_cancel() {
        let mut draft = SetupDraft::default();
        assert_eq!(
            draft
                .apply(
                    SetupStep::Disposal,
                    "0x3333333333333333333333333333333333333333"
                )
                .unwrap(),
            Transition::Next(SetupStep::Confirm)
        );
        assert!(draft.summary().contains("transfer to 0x3333"));
        // Incomplete drafts cannot be confirmed
        assert_eq!(
            draft.apply(SetupStep::Confirm, "yes"),
            Err(ValidationError::Confirmation)
        );
        assert_eq!(
            draft.apply(SetupStep::Confirm, "no").unwrap(),
            Transition::Cancelled
        );
    }
}
