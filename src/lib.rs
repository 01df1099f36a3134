//! Launch sniper.
//!
//! # Overview
//!
//! Watches a feed of observed transactions for pools launched by a tracked
//! address, buys into each new pool and then disposes of the acquired token,
//! either by selling it back through the pool or by transferring it out.
//!
//! Use [`session::SessionRegistry`] to provision a wallet and register a
//! [`types::SniperConfig`] for it, then [`session::SessionRegistry::watch_funding`]
//! to wait for the wallet to be funded. Once funded, the session's pipeline
//! tails the event stream ([`stream::Tailer`]), resolves launched pools
//! ([`resolve::Resolver`]) and hands every match to its own
//! [`orchestrator::TradeOrchestrator`] task.
//!
//! Keys and signing live in a custodial backend reached through
//! [`backend::TradeClient`], chain reads go through [`node::Node`] and status
//! text is delivered through [`notify::Notifier`].
//!
//! # Limitations/follow-ups
//!
//! * The event stream is polled on a fixed interval, file change
//!   notifications could reduce detection latency.
//!
//! * Quotes used for the slippage guards are simulated against the latest
//!   block and can go stale between the quote and the trade.
//!
//! # Testing
//!
//! [`testing`] module provides in-memory node, backend and notifier doubles
//! recording every call made through them.

pub mod abi;
pub mod backend;
pub mod error;
pub mod funding;
pub mod node;
pub mod notify;
pub mod num;
pub mod orchestrator;
pub mod pipeline;
pub mod resolve;
pub mod session;
pub mod setup;
pub mod stream;
pub mod testing;
pub mod types;

use alloy::primitives::{Address, B256, address, b256};

#[derive(Clone, Debug)]
/// Launchpad the tracked pools are created on.
pub struct Launchpad {
    chain_id: u64,
    factory: Address,
    pool_created_topic: B256,
}

impl Launchpad {
    pub fn base() -> Self {
        Self {
            chain_id: 8453,
            factory: address!("0x07dfaec8e182c5ef79844adc70708c1c15aa60fb"),
            pool_created_topic: b256!(
                "0x01b6aab41d4eb83cfcd6c8c59cc6c3dd697ac0110c58c23bf222e7884e44245c"
            ),
        }
    }

    pub fn custom(chain_id: u64, factory: Address, pool_created_topic: B256) -> Self {
        Self {
            chain_id,
            factory,
            pool_created_topic,
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Factory contract emitting the pool creation log.
    pub fn factory(&self) -> Address {
        self.factory
    }

    /// Signature hash of the pool creation event, `topics[0]` of its log.
    pub fn pool_created_topic(&self) -> B256 {
        self.pool_created_topic
    }
}
