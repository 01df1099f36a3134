//! Session registry.
//!
//! A session is one front-end conversation: a custodial wallet, the strategy
//! registered for it and the lifecycle state of its watch. The registry owns
//! every session and every task spawned on their behalf:
//!
//! * one funding monitor while a session waits for its wallet to be funded,
//! * exactly one detection pipeline while a session is active,
//! * one trade task per matched event, spawned by the pipeline.
//!
//! All of them run on the registry's [`TaskTracker`] and observe a
//! per-session [`CancellationToken`] derived from the registry's root token,
//! so [`SessionRegistry::stop`] tears down a single session and
//! [`SessionRegistry::shutdown`] all of them.

use std::{path::PathBuf, sync::Arc, time::Duration};

use alloy::primitives::{Address, U256};
use dashmap::DashMap;
use fastnum::{UD128, udec128};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{debug, error, info, warn};

use crate::{
    error::SniperError,
    funding, num,
    orchestrator::Services,
    pipeline,
    stream::{CursorStore, Tailer},
    types::{SessionId, SniperConfig, SubmittedTx},
};

/// Default interval between event stream polls.
pub const DEFAULT_TAIL_INTERVAL: Duration = Duration::from_secs(1);

/// Default interval between wallet balance polls.
pub const DEFAULT_FUNDING_INTERVAL: Duration = Duration::from_secs(3);

/// Default ETH kept in the wallet on top of the position size to pay for gas.
pub const DEFAULT_GAS_RESERVE: UD128 = udec128!(0.0003);

/// Settings shared by the pipelines of every session.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub stream_path: PathBuf,
    pub tail_interval: Duration,
    pub funding_interval: Duration,
    pub gas_reserve_eth: UD128,
    /// Directory of the per-session cursor checkpoints, `None` to always
    /// start from the end of the stream.
    pub cursor_dir: Option<PathBuf>,
}

impl PipelineSettings {
    pub fn new(stream_path: impl Into<PathBuf>) -> Self {
        Self {
            stream_path: stream_path.into(),
            tail_interval: DEFAULT_TAIL_INTERVAL,
            funding_interval: DEFAULT_FUNDING_INTERVAL,
            gas_reserve_eth: DEFAULT_GAS_RESERVE,
            cursor_dir: None,
        }
    }

    pub fn gas_reserve_wei(&self) -> U256 {
        num::Converter::ether().to_unsigned(self.gas_reserve_eth)
    }
}

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, nothing running.
    Idle,
    /// Funding monitor running.
    AwaitingFunds,
    /// Detection pipeline running.
    Active,
}

/// Snapshot of a registered session.
#[derive(Clone, Debug)]
pub struct SniperSession {
    pub id: SessionId,
    pub wallet: Address,
    pub config: Arc<SniperConfig>,
    pub state: SessionState,
}

#[derive(Debug)]
struct SessionEntry {
    wallet: Address,
    config: Arc<SniperConfig>,
    state: SessionState,
    cancel: CancellationToken,
}

struct Inner {
    sessions: DashMap<SessionId, SessionEntry>,
    services: Services,
    settings: PipelineSettings,
    root: CancellationToken,
    tracker: TaskTracker,
}

/// Registry of sniper sessions and their tasks. Cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<Inner>,
}

impl SessionRegistry {
    pub fn new(services: Services, settings: PipelineSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                sessions: DashMap::new(),
                services,
                settings,
                root: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.inner.settings
    }

    /// Creates a custodial wallet and registers `config` for it.
    pub async fn provision(
        &self,
        id: SessionId,
        config: SniperConfig,
    ) -> Result<Address, SniperError> {
        self.ensure_idle(id)?;
        let wallet = self.inner.services.client.create_wallet().await?;
        info!(session = id, %wallet, "Wallet provisioned");
        self.register(id, wallet, config)?;
        Ok(wallet)
    }

    /// Registers `config` with an existing wallet, replacing the previous
    /// registration of an idle session.
    pub fn register(
        &self,
        id: SessionId,
        wallet: Address,
        config: SniperConfig,
    ) -> Result<(), SniperError> {
        self.ensure_idle(id)?;
        self.inner.sessions.insert(
            id,
            SessionEntry {
                wallet,
                config: Arc::new(config),
                state: SessionState::Idle,
                cancel: self.inner.root.child_token(),
            },
        );
        debug!(session = id, %wallet, "Session registered");
        Ok(())
    }

    pub fn session(&self, id: SessionId) -> Option<SniperSession> {
        self.inner.sessions.get(&id).map(|entry| SniperSession {
            id,
            wallet: entry.wallet,
            config: entry.config.clone(),
            state: entry.state,
        })
    }

    pub fn is_active(&self, id: SessionId) -> bool {
        self.inner
            .sessions
            .get(&id)
            .is_some_and(|entry| entry.state == SessionState::Active)
    }

    /// Balance, in wei, the session wallet needs before trading starts:
    /// the position size plus the gas reserve.
    pub fn funding_threshold(&self, id: SessionId) -> Result<U256, SniperError> {
        let entry = self
            .inner
            .sessions
            .get(&id)
            .ok_or(SniperError::UnknownSession(id))?;
        Ok(entry
            .config
            .position_size_wei()
            .saturating_add(self.inner.settings.gas_reserve_wei()))
    }

    /// Starts the funding monitor of an idle session. The session is
    /// activated once its wallet holds [`Self::funding_threshold`].
    pub fn watch_funding(&self, id: SessionId) -> Result<(), SniperError> {
        let threshold = self.funding_threshold(id)?;
        let (wallet, cancel) = {
            let mut entry = self
                .inner
                .sessions
                .get_mut(&id)
                .ok_or(SniperError::UnknownSession(id))?;
            match entry.state {
                SessionState::Active => return Err(SniperError::SessionActive(id)),
                SessionState::AwaitingFunds => return Err(SniperError::AlreadyWatching(id)),
                SessionState::Idle => entry.state = SessionState::AwaitingFunds,
            }
            (entry.wallet, entry.cancel.clone())
        };

        let registry = self.clone();
        self.inner.tracker.spawn(async move {
            let funded = funding::await_funding(
                registry.inner.services.client.as_ref(),
                wallet,
                threshold,
                registry.inner.settings.funding_interval,
                tokio::time::sleep,
                &cancel,
            )
            .await;
            if funded.is_some()
                && let Err(err) = registry.activate(id)
            {
                debug!(session = id, %err, "Session not activated after funding");
            }
        });
        Ok(())
    }

    /// Marks the session active and starts its detection pipeline.
    ///
    /// Fails with [`SniperError::SessionActive`] if the pipeline is already
    /// running, so a session never has more than one.
    pub fn activate(&self, id: SessionId) -> Result<(), SniperError> {
        let (wallet, config, cancel) = {
            let mut entry = self
                .inner
                .sessions
                .get_mut(&id)
                .ok_or(SniperError::UnknownSession(id))?;
            if entry.state == SessionState::Active {
                return Err(SniperError::SessionActive(id));
            }
            entry.state = SessionState::Active;
            (entry.wallet, entry.config.clone(), entry.cancel.clone())
        };
        info!(session = id, %wallet, "Session activated");
        self.notify(id, "Wallet funded, starting sniping...".to_string());

        let registry = self.clone();
        self.inner.tracker.spawn(async move {
            let settings = &registry.inner.settings;
            let store = settings
                .cursor_dir
                .as_ref()
                .map(|dir| CursorStore::new(dir, id));
            let tailer = match Tailer::open(&settings.stream_path, store).await {
                Ok(tailer) => tailer,
                Err(err) => {
                    // Stopped meanwhile, the session may already run a newer pipeline
                    if cancel.is_cancelled() {
                        debug!(session = id, %err, "Event stream not opened for stopped session");
                        return;
                    }
                    error!(session = id, %err, "Could not open event stream");
                    registry.notify(id, format!("Could not open event stream: {err}"));
                    registry.reset(id);
                    return;
                }
            };
            let lines = tailer.into_lines(settings.tail_interval, tokio::time::sleep);
            pipeline::run(
                id,
                wallet,
                config,
                registry.inner.services.clone(),
                lines,
                registry.inner.tracker.clone(),
                cancel,
            )
            .await;
        });
        Ok(())
    }

    /// Cancels every task of the session and returns it to idle.
    pub fn stop(&self, id: SessionId) -> Result<(), SniperError> {
        if !self.inner.sessions.contains_key(&id) {
            return Err(SniperError::UnknownSession(id));
        }
        self.reset(id);
        info!(session = id, "Session stopped");
        Ok(())
    }

    /// Transfers the wallet's native balance, minus the gas reserve, to `to`.
    pub async fn withdraw(&self, id: SessionId, to: Address) -> Result<SubmittedTx, SniperError> {
        let wallet = self
            .session(id)
            .ok_or(SniperError::UnknownSession(id))?
            .wallet;
        let client = &self.inner.services.client;
        let balance = client.eth_balance(wallet).await?;
        let reserve = self.inner.settings.gas_reserve_wei();
        if balance <= reserve {
            return Err(SniperError::NothingToWithdraw {
                balance_wei: balance.to_string(),
            });
        }
        let tx = client.transfer(wallet, to, balance - reserve).await?;
        info!(session = id, %wallet, %to, %tx, "Withdrawn");
        self.notify(id, format!("Withdrawal executed: {tx}"));
        Ok(tx)
    }

    /// Cancels every session and waits for all their tasks to finish.
    pub async fn shutdown(&self) {
        self.inner.root.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!(sessions = self.inner.sessions.len(), "Sessions shut down");
    }

    fn ensure_idle(&self, id: SessionId) -> Result<(), SniperError> {
        match self.inner.sessions.get(&id).map(|entry| entry.state) {
            Some(SessionState::Active) => Err(SniperError::SessionActive(id)),
            Some(SessionState::AwaitingFunds) => Err(SniperError::AlreadyWatching(id)),
            _ => Ok(()),
        }
    }

    fn reset(&self, id: SessionId) {
        if let Some(mut entry) = self.inner.sessions.get_mut(&id) {
            entry.cancel.cancel();
            entry.cancel = self.inner.root.child_token();
            entry.state = SessionState::Idle;
        } else {
            warn!(session = id, "Reset of unknown session");
        }
    }

    fn notify(&self, id: SessionId, text: String) {
        self.inner.services.notifier.notify(id, text);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fastnum::udec128;

    use super::*;
    use crate::{
        Launchpad,
        testing::{
            FakeNode, RecordingNotifier, RecordingTradeClient, TEST_WALLET, TradeCall,
            sniper_config,
        },
    };

    struct Harness {
        client: Arc<RecordingTradeClient>,
        notifier: Arc<RecordingNotifier>,
        registry: SessionRegistry,
        _dir: tempfile::TempDir,
    }

    fn harness(client: RecordingTradeClient) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(client);
        let notifier = Arc::new(RecordingNotifier::default());
        let services = Services {
            launchpad: Launchpad::base(),
            node: Arc::new(FakeNode::default()),
            client: client.clone(),
            notifier: notifier.clone(),
        };
        let settings = PipelineSettings {
            tail_interval: Duration::from_millis(10),
            funding_interval: Duration::from_millis(10),
            ..PipelineSettings::new(dir.path().join("events.jsonl"))
        };
        Harness {
            client,
            notifier,
            registry: SessionRegistry::new(services, settings),
            _dir: dir,
        }
    }

    #[test]
    fn test_funding_threshold_includes_gas_reserve() {
        let h = harness(RecordingTradeClient::default());
        h.registry.register(1, TEST_WALLET, sniper_config()).unwrap();
        assert_eq!(
            h.registry.funding_threshold(1).unwrap(),
            U256::from(50_300_000_000_000_000u64)
        );
        assert!(matches!(
            h.registry.funding_threshold(2),
            Err(SniperError::UnknownSession(2))
        ));
    }

    #[tokio::test]
    async fn test_provision_registers_wallet() {
        let h = harness(RecordingTradeClient::default());
        let wallet = h.registry.provision(1, sniper_config()).await.unwrap();
        assert_eq!(wallet, TEST_WALLET);

        let session = h.registry.session(1).unwrap();
        assert_eq!(session.wallet, TEST_WALLET);
        assert_eq!(session.state, SessionState::Idle);
        assert_eq!(h.client.calls(), vec![TradeCall::CreateWallet]);
    }

    #[tokio::test]
    async fn test_single_pipeline_per_session() {
        let h = harness(RecordingTradeClient::default());
        h.registry.register(1, TEST_WALLET, sniper_config()).unwrap();

        h.registry.activate(1).unwrap();
        assert!(h.registry.is_active(1));
        assert!(matches!(
            h.registry.activate(1),
            Err(SniperError::SessionActive(1))
        ));
        assert!(matches!(
            h.registry.watch_funding(1),
            Err(SniperError::SessionActive(1))
        ));
        assert!(matches!(
            h.registry.register(1, TEST_WALLET, sniper_config()),
            Err(SniperError::SessionActive(1))
        ));
        assert_eq!(
            h.notifier
                .count_starting_with(1, "Wallet funded, starting sniping"),
            1
        );

        h.registry.stop(1).unwrap();
        assert!(!h.registry.is_active(1));
        h.registry.activate(1).unwrap();
        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_stale_activation_does_not_reset_newer_one() {
        let dir = tempfile::tempdir().unwrap();
        // A plain file where the checkpoint directory should be, opening fails
        let cursor_dir = dir.path().join("cursors");
        std::fs::write(&cursor_dir, "").unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let services = Services {
            launchpad: Launchpad::base(),
            node: Arc::new(FakeNode::default()),
            client: Arc::new(RecordingTradeClient::default()),
            notifier: notifier.clone(),
        };
        let settings = PipelineSettings {
            cursor_dir: Some(cursor_dir),
            ..PipelineSettings::new(dir.path().join("events.jsonl"))
        };
        let registry = SessionRegistry::new(services, settings);
        registry.register(1, TEST_WALLET, sniper_config()).unwrap();

        registry.activate(1).unwrap();
        registry.stop(1).unwrap();
        registry.activate(1).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.is_active(1) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        registry.shutdown().await;
        assert_eq!(
            notifier.count_starting_with(1, "Could not open event stream"),
            1
        );
    }

    #[tokio::test]
    async fn test_funding_activates_session() {
        let h = harness(
            RecordingTradeClient::default()
                .with_eth_balances([U256::ZERO, U256::from(50_300_000_000_000_000u64)]),
        );
        h.registry.register(1, TEST_WALLET, sniper_config()).unwrap();
        h.registry.watch_funding(1).unwrap();
        assert!(matches!(
            h.registry.watch_funding(1),
            Err(SniperError::AlreadyWatching(1))
        ));

        tokio::time::timeout(Duration::from_secs(5), async {
            while !h.registry.is_active(1) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        h.registry.shutdown().await;
        assert_eq!(h.client.calls_named("eth_balance").len(), 2);
    }

    #[tokio::test]
    async fn test_withdraw_keeps_gas_reserve() {
        let h = harness(
            RecordingTradeClient::default()
                .with_eth_balances([U256::from(1_000_000_000_000_000u64)]),
        );
        let dest = alloy::primitives::address!("0x3333333333333333333333333333333333333333");
        h.registry.register(1, TEST_WALLET, sniper_config()).unwrap();

        tokio_test::assert_ok!(h.registry.withdraw(1, dest).await);
        assert_eq!(
            h.client.calls_named("transfer"),
            vec![TradeCall::Transfer {
                wallet: TEST_WALLET,
                to: dest,
                eth_out: U256::from(700_000_000_000_000u64),
            }]
        );
    }

    #[tokio::test]
    async fn test_withdraw_below_reserve() {
        let h = harness(
            RecordingTradeClient::default().with_eth_balances([U256::from(1000)]),
        );
        h.registry.register(1, TEST_WALLET, sniper_config()).unwrap();
        assert!(matches!(
            h.registry
                .withdraw(1, alloy::primitives::Address::ZERO)
                .await,
            Err(SniperError::NothingToWithdraw { .. })
        ));
        assert_eq!(
            num::Converter::ether().to_unsigned(udec128!(0.0003)),
            h.registry.settings().gas_reserve_wei()
        );
    }
}
