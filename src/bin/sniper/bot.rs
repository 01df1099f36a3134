//! Sniper runner wiring and main loop.
//!
//! Builds the node, backend and notifier, registers the single session of
//! this process, waits for its wallet to be funded and then prints every
//! notification until interrupted.

use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::Address,
    providers::{DynProvider, ProviderBuilder},
    rpc::client::RpcClient,
};
use fastnum::UD128;
use launch_sniper::{
    Launchpad,
    backend::HttpTradeClient,
    node::RpcNode,
    notify::{ChannelNotifier, Notification},
    num,
    orchestrator::Services,
    session::{PipelineSettings, SessionRegistry},
    types::{SessionId, SniperConfig},
};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use url::Url;

use crate::error::Result;

/// Sniper runner.
pub struct SniperBot {
    registry: SessionRegistry,
    session: SessionId,
    notifications: mpsc::UnboundedReceiver<Notification>,
}

impl SniperBot {
    /// Create a new sniper runner.
    pub fn try_new(
        node_url: Url,
        backend_url: Url,
        api_key: String,
        launchpad: Launchpad,
        settings: PipelineSettings,
        session: SessionId,
        timeout: Duration,
    ) -> Result<Self> {
        info!(
            %node_url,
            %backend_url,
            factory = %launchpad.factory(),
            stream = %settings.stream_path.display(),
            "Initializing sniper"
        );

        let rpc_client = RpcClient::new_http(node_url);
        let provider = DynProvider::new(ProviderBuilder::new().connect_client(rpc_client));
        let (notifier, notifications) = ChannelNotifier::new();

        let services = Services {
            launchpad,
            node: Arc::new(RpcNode::new(provider).with_timeout(timeout)),
            client: Arc::new(HttpTradeClient::with_timeout(
                backend_url,
                Some(api_key),
                timeout,
            )?),
            notifier: Arc::new(notifier),
        };

        Ok(Self {
            registry: SessionRegistry::new(services, settings),
            session,
            notifications,
        })
    }

    /// Register the session, wait for funding and run until Ctrl-C.
    pub async fn run(
        &mut self,
        config: SniperConfig,
        wallet: Option<Address>,
        sweep_to: Option<Address>,
    ) -> Result<()> {
        let wallet = match wallet {
            Some(wallet) => {
                self.registry.register(self.session, wallet, config)?;
                wallet
            }
            None => {
                println!("Creating wallet via backend...");
                self.registry.provision(self.session, config).await?
            }
        };

        let threshold = self.registry.funding_threshold(self.session)?;
        let threshold_eth: UD128 = num::Converter::ether().from_unsigned(threshold);
        println!("Please fund the address {wallet} with at least {threshold_eth} ETH (including gas).");
        self.registry.watch_funding(self.session)?;

        loop {
            tokio::select! {
                notification = self.notifications.recv() => {
                    let Some(Notification { session, text }) = notification else {
                        warn!("Notification channel closed");
                        break;
                    };
                    println!("[{session}] {text}");
                }
                signal = tokio::signal::ctrl_c() => {
                    if let Err(e) = signal {
                        error!(%e, "Failed to listen for Ctrl-C");
                    }
                    info!("Interrupted, shutting down");
                    break;
                }
            }
        }

        self.registry.stop(self.session)?;
        if let Some(to) = sweep_to {
            match self.registry.withdraw(self.session, to).await {
                Ok(tx) => println!("Swept remaining ETH to {to}: {tx}"),
                Err(e) => warn!(%e, "Sweep failed"),
            }
        }
        self.registry.shutdown().await;

        while let Ok(Notification { session, text }) = self.notifications.try_recv() {
            println!("[{session}] {text}");
        }
        Ok(())
    }
}
