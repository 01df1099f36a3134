use std::{fmt::Display, time::Duration};

use alloy::{contract, primitives::TxHash, transports};

use crate::types::SessionId;

/// Event stream record that could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid origin address: {0:?}")]
    InvalidOrigin(String),
}

/// Event stream or cursor checkpoint could not be read or written.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt cursor checkpoint: {0}")]
    Checkpoint(#[from] serde_json::Error),
}

/// Error returned by the remote node for a read or a simulated call.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("fatal error: {0}")]
    Fatal(String),

    #[error("unexpected empty RPC response")]
    NullResp,

    #[error("call reverted: {0}")]
    Reverted(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("undecodable response: {0}")]
    Decode(String),
}

/// Error returned by the custodial backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid backend endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("undecodable backend response: {0}")]
    Decode(String),
}

/// Pool and token of a matched event could not be determined.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("no transaction hash to fetch the receipt for")]
    NoTxHash,

    #[error("receipt not found for {0}")]
    ReceiptNotFound(TxHash),

    #[error("no pool creation log in {0}")]
    NoPoolCreated(TxHash),

    #[error("receipt fetch failed: {0}")]
    Node(#[from] NodeError),
}

/// A trade step failed, either while quoting its guard or at the backend.
#[derive(Debug, thiserror::Error)]
pub enum TradeError {
    #[error("quote failed: {0}")]
    Quote(#[from] NodeError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Setup input that does not describe a valid strategy parameter.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid slippage. Please enter a number between 0 and 100:")]
    Slippage,

    #[error("Invalid address. Please enter a 0x-prefixed 20 byte address:")]
    Address,

    #[error("Invalid wait time. Please enter a number or 0:")]
    WaitTime,

    #[error("Invalid position size. Please enter a positive number:")]
    PositionSize,

    #[error("Please answer yes or no:")]
    Confirmation,
}

/// Registry level error.
#[derive(Debug, thiserror::Error)]
pub enum SniperError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("session {0} is already active")]
    SessionActive(SessionId),

    #[error("session {0} is already waiting for funds")]
    AlreadyWatching(SessionId),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("nothing to withdraw, balance {balance_wei} wei does not cover the gas reserve")]
    NothingToWithdraw { balance_wei: String },
}

impl From<contract::Error> for NodeError {
    fn from(value: contract::Error) -> Self {
        match value {
            contract::Error::TransportError(rpc_err) => Self::from(rpc_err),
            contract::Error::ZeroData(_, _) => Self::NullResp,
            contract::Error::AbiError(_) => Self::Decode(value.to_string()),
            _ => Self::Fatal(value.to_string()),
        }
    }
}

impl<E: Display> From<transports::RpcError<E>> for NodeError {
    fn from(value: transports::RpcError<E>) -> Self {
        match value {
            transports::RpcError::ErrorResp(ref resp) => {
                // Execution reverts are reported with code 3 by geth-like nodes,
                // some providers only keep the message
                let msg = resp.message.to_ascii_lowercase();
                if resp.code == 3 || msg.contains("reverted") {
                    Self::Reverted(resp.message.to_string())
                } else {
                    Self::Transport(value.to_string())
                }
            }
            transports::RpcError::NullResp => Self::NullResp,
            transports::RpcError::DeserError { .. } => Self::Decode(value.to_string()),
            _ => Self::Transport(value.to_string()),
        }
    }
}

impl From<alloy::sol_types::Error> for NodeError {
    fn from(value: alloy::sol_types::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use alloy::rpc::json_rpc::ErrorPayload;

    use super::*;

    fn error_resp(code: i64, message: &'static str) -> transports::RpcError<String> {
        transports::RpcError::ErrorResp(ErrorPayload {
            code,
            message: message.into(),
            data: None,
        })
    }

    #[test]
    fn test_revert_is_classified() {
        assert!(matches!(
            NodeError::from(error_resp(3, "execution reverted: deadline")),
            NodeError::Reverted(_)
        ));
        assert!(matches!(
            NodeError::from(error_resp(-32000, "Execution Reverted")),
            NodeError::Reverted(_)
        ));
    }

    #[test]
    fn test_other_error_responses_are_transport() {
        assert!(matches!(
            NodeError::from(error_resp(-32005, "rate limited")),
            NodeError::Transport(_)
        ));
        assert!(matches!(
            NodeError::from(transports::RpcError::<String>::NullResp),
            NodeError::NullResp
        ));
    }
}
