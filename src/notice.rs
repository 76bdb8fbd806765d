//! User-facing notices.
//!
//! The controller never renders anything itself; it publishes notices and
//! whoever draws the page decides how to show them.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::dispatcher::ActionKind;
use crate::error::WriteError;

const NOTICE_CAPACITY: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notice {
    /// Wallet is on a network other than the supported one
    WrongNetwork { network: String, chain_id: u64 },
    /// A presale or public mint was mined
    Minted { kind: ActionKind },
    /// The owner's start-presale transaction was mined
    PresaleStarted,
    /// A dispatched action ended in failure
    ActionFailed {
        kind: ActionKind,
        #[serde(serialize_with = "serialize_reason")]
        reason: WriteError,
    },
}

fn serialize_reason<S: serde::Serializer>(reason: &WriteError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&reason.to_string())
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::WrongNetwork { network, .. } => {
                write!(f, "Please connect to the {} test network", network)
            }
            Notice::Minted { .. } => write!(f, "You have successfully minted a Crypto Dev!"),
            Notice::PresaleStarted => write!(f, "Presale started"),
            Notice::ActionFailed { kind, reason } => {
                write!(f, "Something went wrong during {}: {}", kind, reason)
            }
        }
    }
}

/// Cheap, cloneable publisher of notices
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(NOTICE_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Publish a notice; having nobody listening is not an error
    pub fn notify(&self, notice: Notice) {
        debug!("Notice: {}", notice);
        let _ = self.tx.send(notice);
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}
