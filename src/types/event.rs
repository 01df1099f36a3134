use alloy::primitives::{Address, TxHash};
use serde::Deserialize;

use crate::error::ParseError;

/// Transaction observed on the event stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionEvent {
    origin: Address,
    tx_hash: Option<TxHash>,
    raw_tx_hash: String,
    pool_address: Option<Address>,
    token_addresses: Vec<Address>,
}

/// Wire shape of a single stream record.
#[derive(Deserialize)]
struct Record {
    from: String,
    #[serde(default)]
    tx_hash: Option<String>,
    #[serde(default)]
    pool_address: Option<String>,
    #[serde(default)]
    token_addresses: Option<Vec<String>>,
}

impl TransactionEvent {
    pub fn new(
        origin: Address,
        tx_hash: Option<TxHash>,
        pool_address: Option<Address>,
        token_addresses: Vec<Address>,
    ) -> Self {
        Self {
            origin,
            tx_hash,
            raw_tx_hash: tx_hash.map(|h| h.to_string()).unwrap_or_default(),
            pool_address,
            token_addresses,
        }
    }

    /// Decodes one line of the event stream.
    ///
    /// Only the origin is mandatory. Empty or malformed enrichment fields are
    /// treated as absent so the event can still be resolved from its receipt.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let record: Record = serde_json::from_str(line)?;

        let origin = record
            .from
            .trim()
            .parse()
            .map_err(|_| ParseError::InvalidOrigin(record.from.clone()))?;

        let raw_tx_hash = record.tx_hash.unwrap_or_default().trim().to_string();
        let tx_hash = raw_tx_hash.parse().ok();

        let pool_address = record
            .pool_address
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse().ok());

        let token_addresses = record
            .token_addresses
            .unwrap_or_default()
            .iter()
            .map(|s| s.trim().parse::<Address>())
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_default();

        Ok(Self {
            origin,
            tx_hash,
            raw_tx_hash,
            pool_address,
            token_addresses,
        })
    }

    /// Whether the transaction was sent by `tracked`.
    ///
    /// Addresses are compared as bytes, so hex casing and checksums
    /// of the textual forms do not matter.
    pub fn originates_from(&self, tracked: &Address) -> bool {
        self.origin == *tracked
    }

    pub fn origin(&self) -> Address {
        self.origin
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        self.tx_hash
    }

    /// Transaction hash as it appeared on the stream, for display.
    pub fn raw_tx_hash(&self) -> &str {
        &self.raw_tx_hash
    }

    pub fn pool_address(&self) -> Option<Address> {
        self.pool_address
    }

    pub fn token_addresses(&self) -> &[Address] {
        &self.token_addresses
    }
}
