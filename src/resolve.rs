//! Pool and token resolution for matched launch transactions.
//!
//! Enriched events carry the pool and token addresses already and resolve
//! without touching the network. Bare events cost exactly one receipt fetch,
//! the pool creation log emitted by the launchpad factory is then decoded
//! from the receipt. Lookups are never retried nor cached.

use std::sync::Arc;

use alloy::primitives::{Address, B256};
use tracing::debug;

use crate::{
    Launchpad,
    error::ResolutionError,
    node::Node,
    types::{ReceiptLog, ResolvedPair, TransactionEvent},
};

/// Minimum number of topics of a pool creation log: signature, pool, token.
const POOL_CREATED_TOPICS: usize = 3;

/// Resolves launched pools of matched events.
#[derive(Clone)]
pub struct Resolver {
    launchpad: Launchpad,
    node: Arc<dyn Node>,
}

impl Resolver {
    pub fn new(launchpad: Launchpad, node: Arc<dyn Node>) -> Self {
        Self { launchpad, node }
    }

    pub async fn resolve(&self, event: &TransactionEvent) -> Result<ResolvedPair, ResolutionError> {
        if let Some(pair) = from_enriched(event) {
            debug!(pool = %pair.pool, token = %pair.token, "Resolved from enriched fields");
            return Ok(pair);
        }

        let tx_hash = event.tx_hash().ok_or(ResolutionError::NoTxHash)?;
        let logs = self
            .node
            .receipt_logs(tx_hash)
            .await?
            .ok_or(ResolutionError::ReceiptNotFound(tx_hash))?;

        let pair = decode_pool_created(&self.launchpad, &logs)
            .ok_or(ResolutionError::NoPoolCreated(tx_hash))?;
        debug!(%tx_hash, pool = %pair.pool, token = %pair.token, "Resolved from receipt");
        Ok(pair)
    }
}

fn from_enriched(event: &TransactionEvent) -> Option<ResolvedPair> {
    Some(ResolvedPair {
        pool: event.pool_address()?,
        token: *event.token_addresses().first()?,
    })
}

/// Finds the first pool creation log of the launchpad factory and decodes
/// the pool from its second topic and the token from its third.
pub fn decode_pool_created(launchpad: &Launchpad, logs: &[ReceiptLog]) -> Option<ResolvedPair> {
    logs.iter()
        .find(|log| {
            log.address == launchpad.factory()
                && log.topics.len() >= POOL_CREATED_TOPICS
                && log.topics[0] == launchpad.pool_created_topic()
        })
        .map(|log| ResolvedPair {
            pool: topic_to_address(&log.topics[1]),
            token: topic_to_address(&log.topics[2]),
        })
}

/// Address carried by an indexed topic, the last 20 of its 32 bytes.
pub fn topic_to_address(topic: &B256) -> Address {
    Address::from_word(*topic)
}
