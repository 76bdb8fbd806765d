//! Connection provider.
//!
//! Owns the session's chain handle. A handle is created on connect and
//! invalidated by reconnect or disconnect; every component that talks to the
//! chain receives the handle explicitly and must check it is still live.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::Address;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ConnectionError;
use crate::notice::{Notice, Notifier};
use crate::wallet::{TransactionSigner, WalletProvider};

/// Identifier of one connect..disconnect session
pub type SessionId = Uuid;

/// Read-only, session-scoped handle on the target chain and account
#[derive(Clone)]
pub struct ChainHandle {
    session: SessionId,
    chain_id: u64,
    account: Address,
    epoch: u64,
    live_epoch: Arc<AtomicU64>,
}

impl ChainHandle {
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn account(&self) -> Address {
        self.account
    }

    /// False once the session was torn down or replaced
    pub fn is_live(&self) -> bool {
        self.live_epoch.load(Ordering::SeqCst) == self.epoch
    }
}

impl std::fmt::Debug for ChainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainHandle")
            .field("session", &self.session)
            .field("chain_id", &self.chain_id)
            .field("account", &self.account)
            .field("live", &self.is_live())
            .finish()
    }
}

impl PartialEq for ChainHandle {
    fn eq(&self, other: &Self) -> bool {
        self.session == other.session
    }
}

impl Eq for ChainHandle {}

/// Chain handle plus a signer; required for writes
#[derive(Clone)]
pub struct SigningHandle {
    handle: ChainHandle,
    signer: Arc<dyn TransactionSigner>,
}

impl SigningHandle {
    pub fn handle(&self) -> &ChainHandle {
        &self.handle
    }

    pub fn signer(&self) -> &dyn TransactionSigner {
        self.signer.as_ref()
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_live()
    }
}

impl std::fmt::Debug for SigningHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningHandle")
            .field("handle", &self.handle)
            .field("signer", &self.signer.address())
            .finish()
    }
}

pub struct ConnectionProvider {
    wallet: Arc<dyn WalletProvider>,
    expected_chain_id: u64,
    network_name: String,
    current: Mutex<Option<ChainHandle>>,
    live_epoch: Arc<AtomicU64>,
    connect_lock: tokio::sync::Mutex<()>,
    notifier: Notifier,
}

impl ConnectionProvider {
    pub fn new(
        wallet: Arc<dyn WalletProvider>,
        expected_chain_id: u64,
        network_name: impl Into<String>,
        notifier: Notifier,
    ) -> Self {
        Self {
            wallet,
            expected_chain_id,
            network_name: network_name.into(),
            current: Mutex::new(None),
            live_epoch: Arc::new(AtomicU64::new(0)),
            connect_lock: tokio::sync::Mutex::new(()),
            notifier,
        }
    }

    /// Current live handle, if connected
    pub fn current(&self) -> Option<ChainHandle> {
        self.lock_current()
            .as_ref()
            .filter(|handle| handle.is_live())
            .cloned()
    }

    /// Connect once: an existing live handle is returned without prompting
    /// the wallet again, after re-checking the network.
    pub async fn connect(&self) -> Result<ChainHandle, ConnectionError> {
        let _guard = self.connect_lock.lock().await;

        if let Some(handle) = self.current() {
            self.verify_network().await?;
            return Ok(handle);
        }

        self.open_session().await
    }

    /// Drop the current session and open a new one (account or network change)
    pub async fn reconnect(&self) -> Result<ChainHandle, ConnectionError> {
        let _guard = self.connect_lock.lock().await;
        self.invalidate();
        self.open_session().await
    }

    /// Tear down the current session; outstanding handles become stale
    pub fn disconnect(&self) {
        if self.invalidate() {
            info!("Wallet session closed");
        }
    }

    /// Acquire a signer for the given handle.
    ///
    /// The network check runs here too: the user may have switched networks
    /// since the handle was created.
    pub async fn signer(&self, handle: &ChainHandle) -> Result<SigningHandle, ConnectionError> {
        if !handle.is_live() {
            return Err(ConnectionError::NotConnected);
        }

        self.verify_network().await?;
        let signer = self.wallet.signer().await?;

        if signer.address() != handle.account() {
            warn!(
                "Wallet account changed from {} to {}; reconnect required",
                handle.account(),
                signer.address()
            );
            return Err(ConnectionError::NotConnected);
        }

        // The session may have been replaced while the wallet was prompting
        if !handle.is_live() {
            return Err(ConnectionError::NotConnected);
        }

        Ok(SigningHandle {
            handle: handle.clone(),
            signer,
        })
    }

    async fn open_session(&self) -> Result<ChainHandle, ConnectionError> {
        let account = self.wallet.connect().await?;
        let chain_id = self.verify_network().await?;

        let epoch = self.live_epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = ChainHandle {
            session: Uuid::new_v4(),
            chain_id,
            account,
            epoch,
            live_epoch: self.live_epoch.clone(),
        };

        info!(
            "Wallet session {} opened for {} on chain {}",
            handle.session, account, chain_id
        );
        *self.lock_current() = Some(handle.clone());
        Ok(handle)
    }

    async fn verify_network(&self) -> Result<u64, ConnectionError> {
        let chain_id = self.wallet.network().await?;
        if chain_id != self.expected_chain_id {
            warn!(
                "Wallet is on chain {}, expected {} ({})",
                chain_id, self.expected_chain_id, self.network_name
            );
            self.notifier.notify(Notice::WrongNetwork {
                network: self.network_name.clone(),
                chain_id: self.expected_chain_id,
            });
            return Err(ConnectionError::WrongNetwork {
                expected: self.expected_chain_id,
                actual: chain_id,
            });
        }
        Ok(chain_id)
    }

    /// Returns whether a session was actually torn down
    fn invalidate(&self) -> bool {
        let previous = self.lock_current().take();
        self.live_epoch.fetch_add(1, Ordering::SeqCst);
        previous.is_some()
    }

    fn lock_current(&self) -> std::sync::MutexGuard<'_, Option<ChainHandle>> {
        // A poisoned lock only means a panic elsewhere; the Option is still coherent
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
