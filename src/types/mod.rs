mod config;
mod event;
mod pair;

pub use config::{DisposalPolicy, SniperConfig};
pub use event::TransactionEvent;
pub use pair::{ReceiptLog, ResolvedPair};

/// ID of the session a watch belongs to, assigned by the front-end.
pub type SessionId = u64;

/// Hash of a transaction submitted by the backend, as reported by it.
pub type SubmittedTx = String;
