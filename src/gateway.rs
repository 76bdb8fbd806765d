//! Contract gateway.
//!
//! Typed front for the sale contract's four reads and three writes. The
//! gateway neither caches nor orders calls; it only refuses to touch the
//! chain through a stale handle and translates failures into the read/write
//! taxonomy.

use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use tracing::debug;

use crate::connection::{ChainHandle, SigningHandle};
use crate::error::{Error, ReadError, WriteError};
use crate::evm::client::TxConfirmation;
use crate::evm::contracts::CryptoDevs;

/// A submitted transaction awaiting confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingWrite {
    pub tx_hash: B256,
}

#[async_trait]
pub trait ContractGateway: Send + Sync {
    async fn is_presale_started(&self, handle: &ChainHandle) -> Result<bool, ReadError>;

    /// Unix seconds at which the presale closes
    async fn presale_end_timestamp(&self, handle: &ChainHandle) -> Result<U256, ReadError>;

    async fn minted_count(&self, handle: &ChainHandle) -> Result<U256, ReadError>;

    async fn owner_address(&self, handle: &ChainHandle) -> Result<Address, ReadError>;

    async fn start_presale(&self, signer: &SigningHandle) -> Result<PendingWrite, WriteError>;

    async fn presale_mint(
        &self,
        signer: &SigningHandle,
        fee_wei: U256,
    ) -> Result<PendingWrite, WriteError>;

    async fn public_mint(
        &self,
        signer: &SigningHandle,
        fee_wei: U256,
    ) -> Result<PendingWrite, WriteError>;

    /// Wait for a submitted write to be mined or to fail
    async fn confirm(&self, pending: &PendingWrite) -> Result<TxConfirmation, WriteError>;
}

/// Gateway backed by the on-chain contract over JSON-RPC
pub struct EvmGateway {
    contract: CryptoDevs,
    confirmation_poll: Duration,
    confirmation_attempts: u32,
}

impl EvmGateway {
    pub fn new(contract: CryptoDevs, confirmation_poll: Duration, confirmation_attempts: u32) -> Self {
        Self {
            contract,
            confirmation_poll,
            confirmation_attempts,
        }
    }
}

fn ensure_readable(handle: &ChainHandle) -> Result<(), ReadError> {
    if handle.is_live() {
        Ok(())
    } else {
        Err(ReadError::NotConnected)
    }
}

fn ensure_writable(signer: &SigningHandle) -> Result<(), WriteError> {
    if signer.is_live() {
        Ok(())
    } else {
        Err(WriteError::NotConnected)
    }
}

fn read_error(err: Error) -> ReadError {
    ReadError::RemoteUnavailable(err.to_string())
}

fn write_error(err: Error) -> WriteError {
    match err {
        Error::Evm(evm) if evm.is_revert() => WriteError::RemoteRejected(evm.to_string()),
        Error::Wallet(msg) => WriteError::SigningFailed(msg),
        other => WriteError::RemoteUnavailable(other.to_string()),
    }
}

#[async_trait]
impl ContractGateway for EvmGateway {
    async fn is_presale_started(&self, handle: &ChainHandle) -> Result<bool, ReadError> {
        ensure_readable(handle)?;
        self.contract.presale_started().await.map_err(read_error)
    }

    async fn presale_end_timestamp(&self, handle: &ChainHandle) -> Result<U256, ReadError> {
        ensure_readable(handle)?;
        self.contract.presale_ended().await.map_err(read_error)
    }

    async fn minted_count(&self, handle: &ChainHandle) -> Result<U256, ReadError> {
        ensure_readable(handle)?;
        self.contract.token_ids().await.map_err(read_error)
    }

    async fn owner_address(&self, handle: &ChainHandle) -> Result<Address, ReadError> {
        ensure_readable(handle)?;
        self.contract.owner().await.map_err(read_error)
    }

    async fn start_presale(&self, signer: &SigningHandle) -> Result<PendingWrite, WriteError> {
        ensure_writable(signer)?;
        let tx_hash = self
            .contract
            .start_presale(signer.signer())
            .await
            .map_err(write_error)?;
        Ok(PendingWrite { tx_hash })
    }

    async fn presale_mint(
        &self,
        signer: &SigningHandle,
        fee_wei: U256,
    ) -> Result<PendingWrite, WriteError> {
        ensure_writable(signer)?;
        let tx_hash = self
            .contract
            .presale_mint(fee_wei, signer.signer())
            .await
            .map_err(write_error)?;
        Ok(PendingWrite { tx_hash })
    }

    async fn public_mint(
        &self,
        signer: &SigningHandle,
        fee_wei: U256,
    ) -> Result<PendingWrite, WriteError> {
        ensure_writable(signer)?;
        let tx_hash = self
            .contract
            .mint(fee_wei, signer.signer())
            .await
            .map_err(write_error)?;
        Ok(PendingWrite { tx_hash })
    }

    async fn confirm(&self, pending: &PendingWrite) -> Result<TxConfirmation, WriteError> {
        debug!("Waiting for confirmation of {}", pending.tx_hash);
        self.contract
            .wait_for(
                pending.tx_hash,
                self.confirmation_poll,
                self.confirmation_attempts,
            )
            .await
            .map_err(write_error)
    }
}
