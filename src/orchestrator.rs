//! Per-event trade state machine.
//!
//! Every matched event gets its own [`TradeOrchestrator::run`]:
//! resolve, buy, optionally wait, check the token balance and dispose of it
//! according to the session's [`DisposalPolicy`]. Each remote operation is
//! attempted once, any failure ends only the current event with a single
//! notification.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use tracing::{info, warn};

use crate::{
    Launchpad,
    backend::TradeClient,
    error::{NodeError, TradeError},
    node::Node,
    notify::Notifier,
    num,
    resolve::Resolver,
    types::{DisposalPolicy, ResolvedPair, SessionId, SniperConfig, SubmittedTx, TransactionEvent},
};

/// Number of leading characters of the transaction hash quoted in
/// notifications about unresolved events.
const SHORT_HASH_LEN: usize = 16;

/// Collaborators shared by every session.
#[derive(Clone)]
pub struct Services {
    pub launchpad: Launchpad,
    pub node: Arc<dyn Node>,
    pub client: Arc<dyn TradeClient>,
    pub notifier: Arc<dyn Notifier>,
}

/// Terminal state reached by one matched event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Pool and token could not be determined.
    Unresolved,

    /// The buy was not placed.
    BuyFailed,

    /// Nothing left to dispose of after the buy.
    NoBalance,

    /// The token balance could not be queried.
    BalanceUnavailable,

    /// Tokens sold back or transferred out.
    Disposed(SubmittedTx),

    DisposeFailed,
}

/// Drives one matched event from resolution to disposal.
#[derive(Clone)]
pub struct TradeOrchestrator {
    session: SessionId,
    wallet: Address,
    config: Arc<SniperConfig>,
    resolver: Resolver,
    services: Services,
}

impl TradeOrchestrator {
    pub fn new(
        session: SessionId,
        wallet: Address,
        config: Arc<SniperConfig>,
        services: Services,
    ) -> Self {
        Self {
            session,
            wallet,
            config,
            resolver: Resolver::new(services.launchpad.clone(), services.node.clone()),
            services,
        }
    }

    pub async fn run(&self, event: TransactionEvent) -> Outcome {
        let pair = match self.resolver.resolve(&event).await {
            Ok(pair) => pair,
            Err(err) => {
                warn!(session = self.session, tx = event.raw_tx_hash(), %err, "Launch not resolved");
                self.notify(format!(
                    "Matched tracked address but could not extract pool/token from tx {}...",
                    short_hash(event.raw_tx_hash())
                ));
                return Outcome::Unresolved;
            }
        };
        self.announce(&event, pair).await;

        match self.buy(pair).await {
            Ok(tx) => {
                info!(session = self.session, pool = %pair.pool, %tx, "Bought");
                self.notify(format!("Buy executed: {tx}"));
            }
            Err(err) => {
                warn!(session = self.session, pool = %pair.pool, %err, "Buy failed");
                self.notify(format!("Buy failed: {err}"));
                return Outcome::BuyFailed;
            }
        }

        if let Some(wait) = self.config.wait() {
            self.notify(format!("Waiting {}s before disposing...", wait.as_secs()));
            tokio::time::sleep(wait).await;
        }

        let balance = match self
            .services
            .client
            .token_balance(self.wallet, pair.token)
            .await
        {
            Ok(balance) => balance,
            Err(err) => {
                warn!(session = self.session, token = %pair.token, %err, "Balance check failed");
                self.notify(format!("Balance check failed: {err}"));
                return Outcome::BalanceUnavailable;
            }
        };
        if balance.is_zero() {
            self.notify("No tokens to dispose.".to_string());
            return Outcome::NoBalance;
        }

        let (action, result) = match self.config.disposal {
            DisposalPolicy::SellBack => ("Sell", self.sell(pair, balance).await),
            DisposalPolicy::TransferTo(to) => ("Transfer", self.transfer(pair, to, balance).await),
        };
        match result {
            Ok(tx) => {
                info!(session = self.session, token = %pair.token, %balance, %tx, "Disposed");
                self.notify(format!("{action} executed: {tx}"));
                Outcome::Disposed(tx)
            }
            Err(err) => {
                warn!(session = self.session, token = %pair.token, %err, "Disposal failed");
                self.notify(format!("{action} failed: {err}"));
                Outcome::DisposeFailed
            }
        }
    }

    async fn announce(&self, event: &TransactionEvent, pair: ResolvedPair) {
        let symbol = match self.services.node.token_symbol(pair.token).await {
            Ok(symbol) if !symbol.is_empty() => format!(" ({symbol})"),
            Ok(_) => String::new(),
            Err(err) => {
                warn!(token = %pair.token, %err, "Symbol lookup failed");
                String::new()
            }
        };
        self.notify(format!(
            "New token launched by tracked address!\nPool: {}\nToken: {}{symbol}\nTx: {}",
            pair.pool,
            pair.token,
            event.raw_tx_hash()
        ));
    }

    async fn buy(&self, pair: ResolvedPair) -> Result<SubmittedTx, TradeError> {
        let eth_in = self.config.position_size_wei();
        let quote = self
            .services
            .node
            .quote_buy(pair.pool, self.wallet, eth_in)
            .await;
        let min_tokens_out = self.min_output(quote, "buy")?;
        Ok(self
            .services
            .client
            .buy(self.wallet, pair.pool, pair.token, eth_in, min_tokens_out)
            .await?)
    }

    async fn sell(&self, pair: ResolvedPair, balance: U256) -> Result<SubmittedTx, TradeError> {
        let client = &self.services.client;
        client
            .approve(self.wallet, pair.pool, pair.token, U256::MAX)
            .await?;
        // Quoted after the approval, the simulated sell reverts without allowance
        let quote = self
            .services
            .node
            .quote_sell(pair.pool, self.wallet, balance)
            .await;
        let min_refund = self.min_output(quote, "sell")?;
        Ok(client
            .sell(self.wallet, pair.pool, pair.token, balance, min_refund)
            .await?)
    }

    /// Minimum output accepted for a trade simulated as `quote`.
    ///
    /// A pool whose simulation returns no data, or data that is not a single
    /// amount, gives nothing to guard against and the trade is placed with a
    /// zero minimum. Reverts and transport failures still fail the trade.
    fn min_output(&self, quote: Result<U256, NodeError>, step: &str) -> Result<U256, NodeError> {
        match quote {
            Ok(expected) => Ok(num::apply_slippage(expected, self.config.slippage_percent)),
            Err(err @ (NodeError::NullResp | NodeError::Decode(_))) => {
                warn!(session = self.session, step, %err, "Pool returned no quote, trading unguarded");
                Ok(U256::ZERO)
            }
            Err(err) => Err(err),
        }
    }

    async fn transfer(
        &self,
        pair: ResolvedPair,
        to: Address,
        balance: U256,
    ) -> Result<SubmittedTx, TradeError> {
        Ok(self
            .services
            .client
            .transfer_token(self.wallet, to, pair.token, balance)
            .await?)
    }

    fn notify(&self, text: String) {
        self.services.notifier.notify(self.session, text);
    }
}

fn short_hash(raw: &str) -> &str {
    if raw.is_empty() {
        return "?";
    }
    raw.get(..SHORT_HASH_LEN).unwrap_or(raw)
}
