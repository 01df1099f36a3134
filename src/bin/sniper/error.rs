//! Error types for the sniper runner.

use launch_sniper::error::{BackendError, SniperError};

/// Main error type for the sniper runner.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Session error: {0}")]
    Sniper(#[from] SniperError),

    #[error("Console I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Setup cancelled")]
    SetupCancelled,
}

pub type Result<T> = std::result::Result<T, Error>;
