use alloy::primitives::{Address, B256};

/// Log entry of a transaction receipt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptLog {
    pub address: Address,
    pub topics: Vec<B256>,
}

/// Pool created by the tracked launch and the token traded in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResolvedPair {
    pub pool: Address,
    pub token: Address,
}

impl ReceiptLog {
    pub fn new(address: Address, topics: Vec<B256>) -> Self {
        Self { address, topics }
    }
}

impl From<&alloy::rpc::types::Log> for ReceiptLog {
    fn from(log: &alloy::rpc::types::Log) -> Self {
        Self {
            address: log.address(),
            topics: log.topics().to_vec(),
        }
    }
}
