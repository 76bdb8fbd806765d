//! Sale controller.
//!
//! Session-scoped context tying the connection provider, state machine,
//! poll task and dispatcher together. Rendering layers read [`SaleView`]s
//! and notices from here and nothing else.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info};

use crate::connection::{ChainHandle, ConnectionProvider};
use crate::config::SaleConfig;
use crate::dispatcher::{ActionDispatcher, ActionKind, ActionStatus};
use crate::error::{ConnectionError, Error, ReadError, WriteError};
use crate::evm::client::{EvmClient, TxConfirmation};
use crate::evm::contracts::CryptoDevs;
use crate::gateway::{ContractGateway, EvmGateway};
use crate::notice::{Notice, Notifier};
use crate::sale::{
    Clock, EnabledAction, Phase, PollHandle, RefreshOutcome, SaleFees, SaleSnapshot, SaleState,
    SaleStateMachine, SystemClock,
};
use crate::wallet::WalletProvider;

/// Everything the page may render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaleView {
    pub state: SaleState,
    pub status: ActionStatus,
    pub fees: SaleFees,
    pub max_supply: u64,
}

impl SaleView {
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn snapshot(&self) -> Option<&SaleSnapshot> {
        self.state.snapshot.as_ref()
    }

    /// The single action to offer; none while a write is pending
    pub fn enabled_action(&self) -> Option<EnabledAction> {
        if self.status.is_pending() {
            return None;
        }
        let snapshot = self.state.snapshot.as_ref()?;
        self.state.phase.enabled_action(snapshot, &self.fees)
    }

    /// `"{minted}/{max_supply}"` once a snapshot exists
    pub fn minted_display(&self) -> Option<String> {
        self.state
            .snapshot
            .as_ref()
            .map(|snapshot| format!("{}/{}", snapshot.tokens_minted, self.max_supply))
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub struct SaleController {
    connection: Arc<ConnectionProvider>,
    machine: Arc<SaleStateMachine>,
    dispatcher: ActionDispatcher,
    notifier: Notifier,
    poller: Mutex<Option<PollHandle>>,
    poll_interval: Duration,
    max_supply: u64,
}

impl SaleController {
    /// Controller over the deployed contract described by `config`
    pub fn from_config(config: &SaleConfig, wallet: Arc<dyn WalletProvider>) -> Result<Self, Error> {
        config.validate()?;
        let client = EvmClient::new(&config.network.rpc_url, config.network.chain_id)?;
        let contract = CryptoDevs::new(client, *config.contract_address()?.inner());
        let gateway = EvmGateway::new(
            contract,
            config.confirmation_poll(),
            config.polling.confirmation_attempts,
        );
        Self::new(config, wallet, Arc::new(gateway), Arc::new(SystemClock))
    }

    pub fn new(
        config: &SaleConfig,
        wallet: Arc<dyn WalletProvider>,
        gateway: Arc<dyn ContractGateway>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, Error> {
        let fees = config.fees()?;
        let notifier = Notifier::new();
        let connection = Arc::new(ConnectionProvider::new(
            wallet,
            config.network.chain_id,
            config.network.name.clone(),
            notifier.clone(),
        ));
        let machine = Arc::new(SaleStateMachine::new(
            gateway.clone(),
            clock,
            config.request_timeout(),
        ));
        let dispatcher = ActionDispatcher::new(
            connection.clone(),
            gateway,
            machine.clone(),
            fees,
            notifier.clone(),
        );

        Ok(Self {
            connection,
            machine,
            dispatcher,
            notifier,
            poller: Mutex::new(None),
            poll_interval: config.poll_interval(),
            max_supply: config.economics.max_supply,
        })
    }

    /// Connect the wallet and start tracking the sale.
    ///
    /// Idempotent: while connected this re-checks the network and returns
    /// the current phase without restarting the poll task.
    pub async fn connect(&self) -> Result<Phase, ConnectionError> {
        let mut poller = self.poller.lock().await;
        let handle = self.connection.connect().await?;

        if self.machine.state().session == Some(handle.session()) {
            return Ok(self.machine.phase());
        }

        Ok(self.start_session(&mut poller, handle).await)
    }

    /// Replace the session after an account or network change
    pub async fn reconnect(&self) -> Result<Phase, ConnectionError> {
        let mut poller = self.poller.lock().await;
        stop_polling(&mut poller).await;

        match self.connection.reconnect().await {
            Ok(handle) => Ok(self.start_session(&mut poller, handle).await),
            Err(e) => {
                self.machine.end_session();
                Err(e)
            }
        }
    }

    pub async fn disconnect(&self) {
        let mut poller = self.poller.lock().await;
        stop_polling(&mut poller).await;
        self.connection.disconnect();
        self.machine.end_session();
    }

    /// Force one refresh outside the poll schedule
    pub async fn refresh(&self) -> Result<Phase, ReadError> {
        let handle = self.connection.current().ok_or(ReadError::NotConnected)?;
        match self.machine.refresh(&handle).await {
            RefreshOutcome::Aborted(e) => Err(e),
            _ => Ok(self.machine.phase()),
        }
    }

    pub async fn dispatch(&self, kind: ActionKind) -> Result<TxConfirmation, WriteError> {
        self.dispatcher.dispatch(kind).await
    }

    pub fn view(&self) -> SaleView {
        SaleView {
            state: self.machine.state(),
            status: self.dispatcher.status(),
            fees: *self.dispatcher.fees(),
            max_supply: self.max_supply,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SaleState> {
        self.machine.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ActionStatus> {
        self.dispatcher.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notifier.subscribe()
    }

    /// Whether a poll task is currently running
    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .map_or(false, |poller| !poller.is_finished())
    }

    async fn start_session(&self, poller: &mut Option<PollHandle>, handle: ChainHandle) -> Phase {
        stop_polling(poller).await;
        self.machine.begin_session(&handle);

        let outcome = self.machine.refresh(&handle).await;
        debug!("Initial refresh for session {}: {:?}", handle.session(), outcome);

        let phase = self.machine.phase();
        if phase == Phase::SaleEnded {
            info!("Sale already ended, not polling");
        } else {
            *poller = Some(PollHandle::spawn(
                self.machine.clone(),
                handle,
                self.poll_interval,
            ));
        }
        phase
    }
}

async fn stop_polling(poller: &mut Option<PollHandle>) {
    if let Some(handle) = poller.take() {
        handle.shutdown().await;
    }
}
