//! Configuration for the sniper runner.
//!
//! Configuration comes from two sources:
//! - Environment variables (via .env file or shell): endpoints, credentials, launchpad
//! - CLI arguments: strategy parameters

use std::{path::PathBuf, time::Duration};

use alloy::primitives::{Address, B256};
use clap::Parser;
use fastnum::{UD64, UD128, decimal::Context, udec64};
use launch_sniper::{
    Launchpad,
    session::PipelineSettings,
    types::{DisposalPolicy, SniperConfig},
};
use url::Url;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
const DEFAULT_STREAM_PATH: &str = "data/output.jsonl";

/// Environment configuration (endpoints, credentials).
#[derive(Debug, serde::Deserialize)]
pub struct EnvConfig {
    /// Custodial backend base URL (default: http://localhost:8080)
    pub backend_api_url: Option<String>,

    /// API key sent to the backend
    pub backend_api_key: String,

    /// RPC URL for the node
    pub node_rpc_url: String,

    /// Newline-delimited JSON feed of observed transactions
    pub event_stream_path: Option<String>,

    /// Launchpad factory address (default: Base launchpad)
    pub factory_address: Option<String>,

    /// Signature hash of the pool creation event
    pub pool_created_topic: Option<String>,

    /// Chain ID (default: 8453)
    pub chain_id: Option<u64>,

    /// Directory for per-session cursor checkpoints, unset to always start
    /// from the end of the stream
    pub cursor_dir: Option<String>,

    /// Optional timeout for node and backend requests (default: 10s)
    pub timeout_seconds: Option<u64>,
}

impl EnvConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    pub fn backend_url(&self) -> Result<Url, url::ParseError> {
        let raw = self
            .backend_api_url
            .as_deref()
            .unwrap_or(DEFAULT_BACKEND_URL);
        // Joined endpoints must land under the base path
        if raw.ends_with('/') {
            Url::parse(raw)
        } else {
            Url::parse(&format!("{raw}/"))
        }
    }

    pub fn node_url(&self) -> Result<Url, url::ParseError> {
        Url::parse(&self.node_rpc_url)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.unwrap_or(10))
    }

    pub fn stream_path(&self) -> PathBuf {
        PathBuf::from(
            self.event_stream_path
                .as_deref()
                .unwrap_or(DEFAULT_STREAM_PATH),
        )
    }

    /// Launchpad to watch, the Base launchpad with any configured override.
    pub fn launchpad(&self) -> Result<Launchpad, ConfigError> {
        let base = Launchpad::base();
        let factory = match &self.factory_address {
            Some(raw) => raw
                .parse::<Address>()
                .map_err(|_| ConfigError::InvalidAddress("FACTORY_ADDRESS".to_string()))?,
            None => base.factory(),
        };
        let topic = match &self.pool_created_topic {
            Some(raw) => raw
                .parse::<B256>()
                .map_err(|_| ConfigError::InvalidTopic(raw.clone()))?,
            None => base.pool_created_topic(),
        };
        Ok(Launchpad::custom(
            self.chain_id.unwrap_or(base.chain_id()),
            factory,
            topic,
        ))
    }
}

/// CLI arguments for the sniping strategy.
#[derive(Debug, Parser)]
#[command(name = "sniper")]
#[command(about = "Buys into pools launched by a tracked address and disposes of the tokens")]
pub struct CliConfig {
    /// Address whose launches trigger a buy. Starts the interactive setup when omitted
    #[arg(long)]
    pub tracked_address: Option<String>,

    /// ETH spent on every buy (e.g., 0.05)
    #[arg(long)]
    pub position_size: Option<String>,

    /// Slippage tolerance in percent
    #[arg(long, default_value = "10")]
    pub slippage: String,

    /// Seconds to wait between the buy and the disposal
    #[arg(long, default_value_t = 0)]
    pub wait_seconds: u64,

    /// Transfer bought tokens to this address instead of selling them back
    #[arg(long)]
    pub transfer_to: Option<String>,

    /// Existing backend wallet to use instead of provisioning a new one
    #[arg(long)]
    pub wallet: Option<String>,

    /// Sweep the wallet's ETH to this address on shutdown
    #[arg(long)]
    pub sweep_to: Option<String>,

    /// ETH kept in the wallet for gas
    #[arg(long, default_value = "0.0003")]
    pub gas_reserve: String,

    /// Event stream poll interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub tail_interval_ms: u64,

    /// Wallet balance poll interval in milliseconds
    #[arg(long, default_value_t = 3000)]
    pub funding_interval_ms: u64,

    /// Session ID used for notifications and cursor checkpoints
    #[arg(long, default_value_t = 1)]
    pub session: u64,
}

impl CliConfig {
    /// Strategy given on the command line, `None` when it has to be
    /// collected interactively.
    pub fn to_sniper_config(&self) -> Result<Option<SniperConfig>, ConfigError> {
        let Some(tracked) = &self.tracked_address else {
            return Ok(None);
        };
        let tracked_address = parse_address("tracked-address", tracked)?;

        let position_size_eth = self
            .position_size
            .as_deref()
            .ok_or(ConfigError::MissingPositionSize)
            .and_then(|raw| {
                UD128::from_str(raw, Context::default())
                    .map_err(|_| ConfigError::InvalidAmount("position-size".to_string()))
            })?;
        if position_size_eth.is_zero() {
            return Err(ConfigError::InvalidAmount("position-size".to_string()));
        }

        let slippage_percent = UD64::from_str(&self.slippage, Context::default())
            .map_err(|_| ConfigError::InvalidAmount("slippage".to_string()))?;
        if slippage_percent > udec64!(100) {
            return Err(ConfigError::SlippageOutOfRange);
        }

        let disposal = match &self.transfer_to {
            Some(raw) => DisposalPolicy::TransferTo(parse_address("transfer-to", raw)?),
            None => DisposalPolicy::SellBack,
        };

        Ok(Some(SniperConfig {
            tracked_address,
            position_size_eth,
            slippage_percent,
            wait_seconds: Some(self.wait_seconds).filter(|w| *w > 0),
            disposal,
        }))
    }

    pub fn wallet(&self) -> Result<Option<Address>, ConfigError> {
        self.wallet
            .as_deref()
            .map(|raw| parse_address("wallet", raw))
            .transpose()
    }

    pub fn sweep_to(&self) -> Result<Option<Address>, ConfigError> {
        self.sweep_to
            .as_deref()
            .map(|raw| parse_address("sweep-to", raw))
            .transpose()
    }

    /// Pipeline settings for the stream at `stream_path`.
    pub fn pipeline_settings(
        &self,
        stream_path: PathBuf,
        cursor_dir: Option<PathBuf>,
    ) -> Result<PipelineSettings, ConfigError> {
        let gas_reserve_eth = UD128::from_str(&self.gas_reserve, Context::default())
            .map_err(|_| ConfigError::InvalidAmount("gas-reserve".to_string()))?;
        Ok(PipelineSettings {
            tail_interval: Duration::from_millis(self.tail_interval_ms),
            funding_interval: Duration::from_millis(self.funding_interval_ms),
            gas_reserve_eth,
            cursor_dir,
            ..PipelineSettings::new(stream_path)
        })
    }
}

fn parse_address(field: &str, raw: &str) -> Result<Address, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidAddress(field.to_string()))
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid address for {0}")]
    InvalidAddress(String),

    #[error("Invalid amount for {0}")]
    InvalidAmount(String),

    #[error("Invalid pool creation topic {0}")]
    InvalidTopic(String),

    #[error("position-size is required with tracked-address")]
    MissingPositionSize,

    #[error("slippage cannot exceed 100%")]
    SlippageOutOfRange,
}
