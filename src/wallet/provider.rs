//! Wallet provider seam.
//!
//! A browser extension, hardware wallet or local key store all reduce to the
//! same three calls: hand over an account, report the network it is on, and
//! produce a signer for writes.

use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use tracing::debug;

use super::{LocalWallet, TransactionSigner};
use crate::error::ConnectionError;
use crate::evm::client::EvmClient;

/// Source of accounts, network information and signers
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Request access to an account; may prompt and may be rejected
    async fn connect(&self) -> Result<Address, ConnectionError>;

    /// Chain id of the network the wallet is currently on
    async fn network(&self) -> Result<u64, ConnectionError>;

    /// Signer for the connected account
    async fn signer(&self) -> Result<Arc<dyn TransactionSigner>, ConnectionError>;
}

/// Provider backed by a local mnemonic wallet and an RPC node.
///
/// Never prompts; the network is whatever chain the RPC node serves.
pub struct LocalWalletProvider {
    wallet: Arc<LocalWallet>,
    client: EvmClient,
}

impl LocalWalletProvider {
    pub fn new(wallet: Arc<LocalWallet>, client: EvmClient) -> Self {
        Self { wallet, client }
    }
}

#[async_trait]
impl WalletProvider for LocalWalletProvider {
    async fn connect(&self) -> Result<Address, ConnectionError> {
        debug!("Local wallet connected as {}", self.wallet.address());
        Ok(self.wallet.address())
    }

    async fn network(&self) -> Result<u64, ConnectionError> {
        self.client
            .remote_chain_id()
            .await
            .map_err(|e| ConnectionError::Unavailable(e.to_string()))
    }

    async fn signer(&self) -> Result<Arc<dyn TransactionSigner>, ConnectionError> {
        Ok(self.wallet.clone())
    }
}

/// Read-only provider for an address without key material.
///
/// Good enough to follow the sale; every write fails with `NoSigner`.
pub struct WatchOnlyProvider {
    address: Address,
    client: EvmClient,
}

impl WatchOnlyProvider {
    pub fn new(address: Address, client: EvmClient) -> Self {
        Self { address, client }
    }
}

#[async_trait]
impl WalletProvider for WatchOnlyProvider {
    async fn connect(&self) -> Result<Address, ConnectionError> {
        Ok(self.address)
    }

    async fn network(&self) -> Result<u64, ConnectionError> {
        self.client
            .remote_chain_id()
            .await
            .map_err(|e| ConnectionError::Unavailable(e.to_string()))
    }

    async fn signer(&self) -> Result<Arc<dyn TransactionSigner>, ConnectionError> {
        Err(ConnectionError::NoSigner)
    }
}
