//! In-memory test doubles.
//!
//! [`FakeNode`] answers receipts, symbols and quotes from preset values,
//! [`RecordingTradeClient`] records every backend call in order and can be
//! told to fail selected operations, [`RecordingNotifier`] keeps every
//! delivered message.
//!
//! All of them count or record calls so tests can assert what did *not*
//! happen as well as what did.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use alloy::primitives::{Address, TxHash, U256, address};
use dashmap::DashMap;
use fastnum::{udec64, udec128};

use crate::{
    backend::TradeClient,
    error::{BackendError, NodeError},
    node::Node,
    notify::Notifier,
    types::{DisposalPolicy, ReceiptLog, SessionId, SniperConfig, SubmittedTx},
};

/// Wallet returned by [`RecordingTradeClient::create_wallet`].
pub const TEST_WALLET: Address = address!("0x5e55105e55105e55105e55105e55105e55105e55");

/// Tracked address used by [`sniper_config`].
pub const TRACKED: Address = address!("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");

/// Strategy buying 0.05 ETH with 10% slippage, selling back without waiting.
pub fn sniper_config() -> SniperConfig {
    SniperConfig {
        tracked_address: TRACKED,
        position_size_eth: udec128!(0.05),
        slippage_percent: udec64!(10),
        wait_seconds: None,
        disposal: DisposalPolicy::SellBack,
    }
}

/// Sleep function yielding to the scheduler instead of waiting.
pub async fn no_sleep(_: Duration) {
    tokio::task::yield_now().await;
}

/// [`Node`] answering from preset values.
#[derive(Debug)]
pub struct FakeNode {
    receipts: HashMap<TxHash, Vec<ReceiptLog>>,
    symbol: Option<String>,
    buy_quote: Option<U256>,
    sell_quote: Option<U256>,
    empty_quotes: bool,
    failing: bool,
    calls: AtomicUsize,
}

impl Default for FakeNode {
    fn default() -> Self {
        Self {
            receipts: HashMap::new(),
            symbol: Some("TKN".to_string()),
            buy_quote: Some(U256::from(1_000_000)),
            sell_quote: Some(U256::from(40_000_000_000_000_000u64)),
            empty_quotes: false,
            failing: false,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FakeNode {
    /// Makes `tx_hash` known with the given receipt logs.
    pub fn with_receipt(mut self, tx_hash: TxHash, logs: Vec<ReceiptLog>) -> Self {
        self.receipts.insert(tx_hash, logs);
        self
    }

    /// Symbol returned by `symbol()`, `None` to revert.
    pub fn with_symbol(mut self, symbol: Option<&str>) -> Self {
        self.symbol = symbol.map(str::to_string);
        self
    }

    /// Simulated pool outputs, `None` to revert.
    pub fn with_quotes(mut self, buy: Option<U256>, sell: Option<U256>) -> Self {
        self.buy_quote = buy;
        self.sell_quote = sell;
        self
    }

    /// Quotes come back without return data.
    pub fn with_empty_quotes(mut self) -> Self {
        self.empty_quotes = true;
        self
    }

    /// Fails every request with a transport error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn call(&self) -> Result<(), NodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(NodeError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Node for FakeNode {
    async fn receipt_logs(&self, tx_hash: TxHash) -> Result<Option<Vec<ReceiptLog>>, NodeError> {
        self.call()?;
        Ok(self.receipts.get(&tx_hash).cloned())
    }

    async fn token_symbol(&self, _token: Address) -> Result<String, NodeError> {
        self.call()?;
        self.symbol
            .clone()
            .ok_or_else(|| NodeError::Reverted("symbol()".to_string()))
    }

    async fn quote_buy(
        &self,
        _pool: Address,
        _wallet: Address,
        _eth_in: U256,
    ) -> Result<U256, NodeError> {
        self.call()?;
        if self.empty_quotes {
            return Err(NodeError::NullResp);
        }
        self.buy_quote
            .ok_or_else(|| NodeError::Reverted("buy()".to_string()))
    }

    async fn quote_sell(
        &self,
        _pool: Address,
        _wallet: Address,
        _token_amount: U256,
    ) -> Result<U256, NodeError> {
        self.call()?;
        if self.empty_quotes {
            return Err(NodeError::NullResp);
        }
        self.sell_quote
            .ok_or_else(|| NodeError::Reverted("sell()".to_string()))
    }
}

/// Backend call recorded by [`RecordingTradeClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TradeCall {
    CreateWallet,
    EthBalance {
        wallet: Address,
    },
    TokenBalance {
        wallet: Address,
        token: Address,
    },
    Buy {
        wallet: Address,
        pool: Address,
        token: Address,
        eth_in: U256,
        min_tokens_out: U256,
    },
    Approve {
        wallet: Address,
        pool: Address,
        token: Address,
        amount: U256,
    },
    Sell {
        wallet: Address,
        pool: Address,
        token: Address,
        token_amount: U256,
        min_refund: U256,
    },
    Transfer {
        wallet: Address,
        to: Address,
        eth_out: U256,
    },
    TransferToken {
        wallet: Address,
        to: Address,
        token: Address,
        amount: U256,
    },
}

impl TradeCall {
    /// Operation name, as passed to [`RecordingTradeClient::fail`].
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateWallet => "create_wallet",
            Self::EthBalance { .. } => "eth_balance",
            Self::TokenBalance { .. } => "token_balance",
            Self::Buy { .. } => "buy",
            Self::Approve { .. } => "approve",
            Self::Sell { .. } => "sell",
            Self::Transfer { .. } => "transfer",
            Self::TransferToken { .. } => "transfer_token",
        }
    }

    /// Whether the call disposes of bought tokens.
    pub fn is_disposal(&self) -> bool {
        matches!(
            self,
            Self::Approve { .. } | Self::Sell { .. } | Self::TransferToken { .. }
        )
    }
}

/// [`TradeClient`] recording every call.
///
/// ETH balances are served from a queue, the last value repeating once the
/// queue is drained. Token balance defaults to 1000 base units.
#[derive(Debug)]
pub struct RecordingTradeClient {
    calls: Mutex<Vec<TradeCall>>,
    eth_balances: Mutex<VecDeque<U256>>,
    token_balance: U256,
    failures: DashMap<&'static str, usize>,
    tx_counter: AtomicUsize,
}

impl Default for RecordingTradeClient {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            eth_balances: Mutex::new(VecDeque::new()),
            token_balance: U256::from(1000),
            failures: DashMap::new(),
            tx_counter: AtomicUsize::new(0),
        }
    }
}

impl RecordingTradeClient {
    pub fn with_eth_balances(self, balances: impl IntoIterator<Item = U256>) -> Self {
        *self.eth_balances.lock().unwrap() = balances.into_iter().collect();
        self
    }

    pub fn with_token_balance(mut self, balance: U256) -> Self {
        self.token_balance = balance;
        self
    }

    /// Fails every call of operation `name`.
    pub fn fail(self, name: &'static str) -> Self {
        self.fail_times(name, usize::MAX)
    }

    /// Fails the next `times` calls of operation `name`.
    pub fn fail_times(self, name: &'static str, times: usize) -> Self {
        self.failures.insert(name, times);
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<TradeCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls of operation `name` received so far.
    pub fn calls_named(&self, name: &str) -> Vec<TradeCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.name() == name)
            .collect()
    }

    fn record(&self, call: TradeCall) -> Result<(), BackendError> {
        let name = call.name();
        self.calls.lock().unwrap().push(call);
        if let Some(mut remaining) = self.failures.get_mut(name)
            && *remaining > 0
        {
            *remaining = remaining.saturating_sub(1);
            return Err(BackendError::Status {
                status: 500,
                body: format!("{name} rejected"),
            });
        }
        Ok(())
    }

    fn submitted(&self) -> SubmittedTx {
        let n = self.tx_counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("0x{n:064x}")
    }
}

#[async_trait::async_trait]
impl TradeClient for RecordingTradeClient {
    async fn create_wallet(&self) -> Result<Address, BackendError> {
        self.record(TradeCall::CreateWallet)?;
        Ok(TEST_WALLET)
    }

    async fn eth_balance(&self, wallet: Address) -> Result<U256, BackendError> {
        self.record(TradeCall::EthBalance { wallet })?;
        let mut balances = self.eth_balances.lock().unwrap();
        let balance = if balances.len() > 1 {
            balances.pop_front()
        } else {
            balances.front().copied()
        };
        Ok(balance.unwrap_or_default())
    }

    async fn token_balance(&self, wallet: Address, token: Address) -> Result<U256, BackendError> {
        self.record(TradeCall::TokenBalance { wallet, token })?;
        Ok(self.token_balance)
    }

    async fn buy(
        &self,
        wallet: Address,
        pool: Address,
        token: Address,
        eth_in: U256,
        min_tokens_out: U256,
    ) -> Result<SubmittedTx, BackendError> {
        self.record(TradeCall::Buy {
            wallet,
            pool,
            token,
            eth_in,
            min_tokens_out,
        })?;
        Ok(self.submitted())
    }

    async fn approve(
        &self,
        wallet: Address,
        pool: Address,
        token: Address,
        amount: U256,
    ) -> Result<SubmittedTx, BackendError> {
        self.record(TradeCall::Approve {
            wallet,
            pool,
            token,
            amount,
        })?;
        Ok(self.submitted())
    }

    async fn sell(
        &self,
        wallet: Address,
        pool: Address,
        token: Address,
        token_amount: U256,
        min_refund: U256,
    ) -> Result<SubmittedTx, BackendError> {
        self.record(TradeCall::Sell {
            wallet,
            pool,
            token,
            token_amount,
            min_refund,
        })?;
        Ok(self.submitted())
    }

    async fn transfer(
        &self,
        wallet: Address,
        to: Address,
        eth_out: U256,
    ) -> Result<SubmittedTx, BackendError> {
        self.record(TradeCall::Transfer {
            wallet,
            to,
            eth_out,
        })?;
        Ok(self.submitted())
    }

    async fn transfer_token(
        &self,
        wallet: Address,
        to: Address,
        token: Address,
        amount: U256,
    ) -> Result<SubmittedTx, BackendError> {
        self.record(TradeCall::TransferToken {
            wallet,
            to,
            token,
            amount,
        })?;
        Ok(self.submitted())
    }
}

/// [`Notifier`] keeping every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(SessionId, String)>>,
}

impl RecordingNotifier {
    /// Messages delivered to `session`, in order.
    pub fn messages(&self, session: SessionId) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == session)
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Number of messages to `session` starting with `prefix`.
    pub fn count_starting_with(&self, session: SessionId, prefix: &str) -> usize {
        self.messages(session)
            .iter()
            .filter(|m| m.starts_with(prefix))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, session: SessionId, text: String) {
        self.messages.lock().unwrap().push((session, text));
    }
}
