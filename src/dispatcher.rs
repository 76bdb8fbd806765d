//! Action dispatcher.
//!
//! Runs one write at a time through the gateway, tracks its status, and
//! reconciles the sale state afterwards whether or not the write succeeded.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::connection::{ChainHandle, ConnectionProvider};
use crate::error::WriteError;
use crate::evm::client::TxConfirmation;
use crate::gateway::{ContractGateway, PendingWrite};
use crate::notice::{Notice, Notifier};
use crate::sale::{SaleFees, SaleStateMachine};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    StartPresale,
    PresaleMint,
    PublicMint,
}

impl ActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::StartPresale => "start presale",
            ActionKind::PresaleMint => "presale mint",
            ActionKind::PublicMint => "public mint",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of the most recent user action
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionStatus {
    #[default]
    Idle,
    Pending { kind: ActionKind },
    Succeeded { kind: ActionKind },
    Failed {
        kind: ActionKind,
        #[serde(serialize_with = "serialize_reason")]
        reason: WriteError,
    },
}

fn serialize_reason<S: serde::Serializer>(reason: &WriteError, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&reason.to_string())
}

impl ActionStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, ActionStatus::Pending { .. })
    }
}

pub struct ActionDispatcher {
    connection: Arc<ConnectionProvider>,
    gateway: Arc<dyn ContractGateway>,
    machine: Arc<SaleStateMachine>,
    fees: SaleFees,
    notifier: Notifier,
    status: watch::Sender<ActionStatus>,
    in_flight: Mutex<()>,
}

impl ActionDispatcher {
    pub fn new(
        connection: Arc<ConnectionProvider>,
        gateway: Arc<dyn ContractGateway>,
        machine: Arc<SaleStateMachine>,
        fees: SaleFees,
        notifier: Notifier,
    ) -> Self {
        let (status, _) = watch::channel(ActionStatus::Idle);
        Self {
            connection,
            gateway,
            machine,
            fees,
            notifier,
            status,
            in_flight: Mutex::new(()),
        }
    }

    pub fn status(&self) -> ActionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ActionStatus> {
        self.status.subscribe()
    }

    pub fn fees(&self) -> &SaleFees {
        &self.fees
    }

    /// Execute `kind` and wait for it to be mined.
    ///
    /// A second dispatch while one is in flight fails with `AlreadyPending`
    /// and leaves the status alone. Every dispatch that reached a live session
    /// ends with exactly one refresh of the sale state.
    pub async fn dispatch(&self, kind: ActionKind) -> Result<TxConfirmation, WriteError> {
        let _in_flight = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                debug!("Rejecting {}: another action is in flight", kind);
                return Err(WriteError::AlreadyPending);
            }
        };

        self.status.send_replace(ActionStatus::Idle);

        let Some(handle) = self.connection.current() else {
            return Err(self.fail(kind, WriteError::NotConnected));
        };

        self.check_gating(kind);

        let result = self.execute(kind, &handle).await;

        match &result {
            Ok(confirmation) => {
                info!(
                    "{} confirmed in tx {} (block {:?})",
                    kind, confirmation.tx_hash, confirmation.block_number
                );
                self.status.send_replace(ActionStatus::Succeeded { kind });
                self.notifier.notify(match kind {
                    ActionKind::StartPresale => Notice::PresaleStarted,
                    ActionKind::PresaleMint | ActionKind::PublicMint => Notice::Minted { kind },
                });
            }
            Err(reason) => {
                self.fail(kind, reason.clone());
            }
        }

        // A failed write may still have moved chain state
        let outcome = self.machine.refresh(&handle).await;
        debug!("Post-{} refresh: {:?}", kind, outcome);

        result
    }

    async fn execute(
        &self,
        kind: ActionKind,
        handle: &ChainHandle,
    ) -> Result<TxConfirmation, WriteError> {
        let signer = self.connection.signer(handle).await?;

        let pending: PendingWrite = match kind {
            ActionKind::StartPresale => self.gateway.start_presale(&signer).await?,
            ActionKind::PresaleMint => {
                self.gateway
                    .presale_mint(&signer, self.fees.presale_wei)
                    .await?
            }
            ActionKind::PublicMint => self.gateway.public_mint(&signer, self.fees.public_wei).await?,
        };

        info!("{} submitted as {}", kind, pending.tx_hash);
        self.status.send_replace(ActionStatus::Pending { kind });

        self.gateway.confirm(&pending).await
    }

    /// Warn when the local view says `kind` should not be offered; the
    /// contract decides.
    fn check_gating(&self, kind: ActionKind) {
        let state = self.machine.state();
        let allowed = state
            .snapshot
            .as_ref()
            .and_then(|snapshot| state.phase.enabled_action(snapshot, &self.fees))
            .map(|action| action.kind == kind)
            .unwrap_or(false);

        if !allowed {
            warn!(
                "Dispatching {} while the sale is in phase {}; the contract may reject it",
                kind, state.phase
            );
        }
    }

    fn fail(&self, kind: ActionKind, reason: WriteError) -> WriteError {
        warn!("{} failed: {}", kind, reason);
        self.status.send_replace(ActionStatus::Failed {
            kind,
            reason: reason.clone(),
        });
        self.notifier.notify(Notice::ActionFailed {
            kind,
            reason: reason.clone(),
        });
        reason
    }
}
