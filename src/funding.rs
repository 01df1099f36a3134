use std::time::Duration;

use alloy::primitives::{Address, U256};
use fastnum::UD128;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{backend::TradeClient, num};

/// Polls the native balance of `wallet` every `interval` until it reaches
/// `threshold` wei.
///
/// Returns the balance that met the threshold, or `None` once `cancel` fires.
/// Failed balance queries are logged and retried on the next tick.
pub async fn await_funding<S, SFut>(
    client: &dyn TradeClient,
    wallet: Address,
    threshold: U256,
    interval: Duration,
    sleep: S,
    cancel: &CancellationToken,
) -> Option<U256>
where
    S: Fn(Duration) -> SFut,
    SFut: Future<Output = ()>,
{
    let converter = num::Converter::ether();
    info!(
        %wallet,
        threshold = %converter.from_unsigned::<2>(threshold),
        "Waiting for wallet funding"
    );
    loop {
        let balance = tokio::select! {
            _ = cancel.cancelled() => return None,
            balance = client.eth_balance(wallet) => balance,
        };
        match balance {
            Ok(balance) if balance >= threshold => {
                let eth: UD128 = converter.from_unsigned(balance);
                info!(%wallet, balance = %eth, "Wallet funded");
                return Some(balance);
            }
            Ok(balance) => {
                debug!(%wallet, balance = %converter.from_unsigned::<2>(balance), "Wallet not funded yet")
            }
            Err(err) => warn!(%wallet, %err, "Balance query failed"),
        }
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = sleep(interval) => {}
        }
    }
}
