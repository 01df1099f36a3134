//! Launch sniper runner.
//!
//! This binary watches the event stream for pools launched by a tracked
//! address, buys into them through the custodial backend and disposes of the
//! bought tokens.

mod bot;
mod config;
mod dialog;
mod error;

use clap::Parser;
use std::{path::PathBuf, process::exit};
use tracing::error;

use bot::SniperBot;
use config::{CliConfig, EnvConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Parse environment configuration, the backend API key is mandatory
    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    // Parse CLI arguments
    let cli_config = CliConfig::parse();

    // Convert to strategy config
    let sniper_config = match cli_config.to_sniper_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let launchpad = match env_config.launchpad() {
        Ok(launchpad) => launchpad,
        Err(e) => {
            eprintln!("Invalid launchpad configuration: {}", e);
            exit(1);
        }
    };

    let (node_url, backend_url) = match (env_config.node_url(), env_config.backend_url()) {
        (Ok(node), Ok(backend)) => (node, backend),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Invalid URL: {}", e);
            exit(1);
        }
    };

    let (wallet, sweep_to) = match (cli_config.wallet(), cli_config.sweep_to()) {
        (Ok(wallet), Ok(sweep_to)) => (wallet, sweep_to),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };

    let settings = match cli_config.pipeline_settings(
        env_config.stream_path(),
        env_config.cursor_dir.as_ref().map(PathBuf::from),
    ) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(1);
        }
    };

    // Strategy from the command line, or asked for interactively
    let sniper_config = match sniper_config {
        Some(config) => config,
        None => match dialog::collect_config().await {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}", e);
                exit(1);
            }
        },
    };

    let mut bot = match SniperBot::try_new(
        node_url,
        backend_url,
        env_config.backend_api_key.clone(),
        launchpad,
        settings,
        cli_config.session,
        env_config.timeout(),
    ) {
        Ok(bot) => bot,
        Err(e) => {
            eprintln!("Failed to create sniper: {}", e);
            exit(1);
        }
    };

    if let Err(e) = bot.run(sniper_config, wallet, sweep_to).await {
        error!(%e, "Sniper encountered an error, shutting down");
        exit(1);
    }
}
