//! Per-session notification sink.
//!
//! Delivery is fire and forget: a notifier must never block nor fail the
//! pipeline that emits into it.

use tokio::sync::mpsc;
use tracing::warn;

use crate::types::SessionId;

/// Receives human readable progress messages of a session.
pub trait Notifier: Send + Sync {
    fn notify(&self, session: SessionId, text: String);
}

/// Message forwarded by [`ChannelNotifier`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub session: SessionId,
    pub text: String,
}

/// Notifier forwarding every message to an unbounded channel.
#[derive(Clone, Debug)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelNotifier {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, session: SessionId, text: String) {
        if self.tx.send(Notification { session, text }).is_err() {
            warn!(session, "Notification receiver dropped");
        }
    }
}
