use std::{pin::pin, sync::Arc};

use alloy::primitives::Address;
use futures::{Stream, StreamExt};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, info};

use crate::{
    orchestrator::{Services, TradeOrchestrator},
    types::{SessionId, SniperConfig, TransactionEvent},
};

/// Runs the detection pipeline of one session until `cancel` fires or the
/// line stream ends.
///
/// Lines are parsed and matched in stream order. Every match is handed to
/// its own [`TradeOrchestrator`] task on `tracker`, which is never awaited
/// here so that a slow event does not hold back detection of the next one.
/// Returns the number of matched events.
pub async fn run(
    session: SessionId,
    wallet: Address,
    config: Arc<SniperConfig>,
    services: Services,
    lines: impl Stream<Item = String>,
    tracker: TaskTracker,
    cancel: CancellationToken,
) -> usize {
    let orchestrator = TradeOrchestrator::new(session, wallet, config.clone(), services);
    let mut lines = pin!(lines);
    let mut matched = 0;
    info!(session, %wallet, tracked = %config.tracked_address, "Watching for launches");

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next() => match line {
                Some(line) => line,
                None => break,
            },
        };

        let event = match TransactionEvent::parse(&line) {
            Ok(event) => event,
            Err(err) => {
                debug!(session, %err, "Skipping record");
                continue;
            }
        };
        if !event.originates_from(&config.tracked_address) {
            continue;
        }

        matched += 1;
        info!(session, tx = event.raw_tx_hash(), "Launch by tracked address");
        let orchestrator = orchestrator.clone();
        let cancel = cancel.clone();
        tracker.spawn(async move {
            let tx = event.raw_tx_hash().to_string();
            tokio::select! {
                _ = cancel.cancelled() => debug!(session, %tx, "Trade cancelled"),
                outcome = orchestrator.run(event) => debug!(session, %tx, ?outcome, "Trade finished"),
            }
        });
    }

    info!(session, matched, "Stopped watching");
    matched
}
