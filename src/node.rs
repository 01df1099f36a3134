//! Remote node access.
//!
//! [`Node`] is the narrow set of chain reads the pipeline needs, [`RpcNode`]
//! implements it over any [`Provider`]. Every request is bounded by the
//! node timeout and attempted once, failures are reported to the caller.

use std::{
    future::Future,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use alloy::{
    primitives::{Address, Bytes, TxHash, U256},
    providers::Provider,
    rpc::types::{TransactionInput, TransactionRequest},
    sol_types::SolCall,
};

use crate::{
    abi::{IERC20Metadata, LaunchPool},
    error::NodeError,
    types::ReceiptLog,
};

/// Default timeout of a single node request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadline passed to the simulated pool calls.
const QUOTE_DEADLINE: Duration = Duration::from_secs(120);

/// Chain reads used by the resolver and the orchestrator.
#[async_trait::async_trait]
pub trait Node: Send + Sync {
    /// Logs of the transaction receipt, `None` if the node does not know the transaction.
    async fn receipt_logs(&self, tx_hash: TxHash) -> Result<Option<Vec<ReceiptLog>>, NodeError>;

    /// Human readable symbol of the token.
    async fn token_symbol(&self, token: Address) -> Result<String, NodeError>;

    /// Tokens `wallet` would receive buying into `pool` with `eth_in` wei.
    async fn quote_buy(&self, pool: Address, wallet: Address, eth_in: U256)
    -> Result<U256, NodeError>;

    /// Wei `wallet` would be refunded selling `token_amount` back to `pool`.
    async fn quote_sell(
        &self,
        pool: Address,
        wallet: Address,
        token_amount: U256,
    ) -> Result<U256, NodeError>;
}

/// [`Node`] backed by an alloy [`Provider`].
#[derive(Clone, Debug)]
pub struct RpcNode<P> {
    provider: P,
    timeout: Duration,
}

impl<P: Provider> RpcNode<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, NodeError>
    where
        F: Future<Output = Result<T, NodeError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| NodeError::Timeout(self.timeout))?
    }
}

#[async_trait::async_trait]
impl<P: Provider + Send + Sync> Node for RpcNode<P> {
    async fn receipt_logs(&self, tx_hash: TxHash) -> Result<Option<Vec<ReceiptLog>>, NodeError> {
        self.bounded(async {
            let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
            Ok(receipt.map(|r| r.inner.logs().iter().map(ReceiptLog::from).collect()))
        })
        .await
    }

    async fn token_symbol(&self, token: Address) -> Result<String, NodeError> {
        self.bounded(async {
            let tx = TransactionRequest::default()
                .to(token)
                .input(TransactionInput::new(Bytes::from(
                    IERC20Metadata::symbolCall {}.abi_encode(),
                )));
            let output = self.provider.call(tx).await?;
            decode_symbol(&output)
        })
        .await
    }

    async fn quote_buy(
        &self,
        pool: Address,
        wallet: Address,
        eth_in: U256,
    ) -> Result<U256, NodeError> {
        self.bounded(async {
            let instance = LaunchPool::new(pool, &self.provider);
            let out = instance
                .buy(U256::ZERO, quote_deadline())
                .from(wallet)
                .value(eth_in)
                .call()
                .await?;
            Ok(out)
        })
        .await
    }

    async fn quote_sell(
        &self,
        pool: Address,
        wallet: Address,
        token_amount: U256,
    ) -> Result<U256, NodeError> {
        self.bounded(async {
            let instance = LaunchPool::new(pool, &self.provider);
            let out = instance
                .sell(token_amount, U256::ZERO, quote_deadline())
                .from(wallet)
                .call()
                .await?;
            Ok(out)
        })
        .await
    }
}

fn quote_deadline() -> U256 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    U256::from((now + QUOTE_DEADLINE).as_secs())
}

/// Decodes the output of `symbol()`.
///
/// Standard tokens return an ABI string: offset word, length word, then the
/// UTF-8 payload. Some older tokens return a zero padded `bytes32` instead.
pub fn decode_symbol(output: &[u8]) -> Result<String, NodeError> {
    if output.is_empty() {
        return Err(NodeError::NullResp);
    }
    if let Ok(symbol) = IERC20Metadata::symbolCall::abi_decode_returns(output) {
        return Ok(symbol);
    }
    if output.len() == 32 {
        let end = output.iter().position(|b| *b == 0).unwrap_or(32);
        if let Ok(symbol) = std::str::from_utf8(&output[..end]) {
            return Ok(symbol.to_string());
        }
    }
    Err(NodeError::Decode(format!(
        "symbol() returned {} undecodable bytes",
        output.len()
    )))
}
