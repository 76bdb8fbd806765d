/// EVM client for the sale controller
///
/// Thin layer over an alloy HTTP provider: read-only contract calls,
/// signed contract writes with EIP-1559 pricing, and receipt polling.
use crate::error::Error;
use crate::evm::tx::Eip1559Transaction;
use crate::evm::types::{EthAddress, EvmCallRequest, EvmError};
use crate::wallet::TransactionSigner;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types_eth::{BlockNumberOrTag, TransactionRequest};
use alloy_sol_types::SolCall;
use alloy_transport_http::{Client, Http};
use std::time::Duration;
use tracing::{debug, info};

/// Gas buffer applied on top of the node's estimate when none is given
pub const DEFAULT_GAS_BUFFER_PERCENT: u64 = 20;

/// A mined transaction that executed successfully
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxConfirmation {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// EVM Client for blockchain interactions
#[derive(Clone)]
pub struct EvmClient {
    /// Alloy provider for RPC communication
    provider: alloy_provider::RootProvider<Http<Client>>,
    /// Chain ID used when signing transactions
    chain_id: u64,
}

impl EvmClient {
    /// Create a new EVM client with the given RPC endpoint and chain ID
    pub fn new(rpc_url: &str, chain_id: u64) -> Result<Self, Error> {
        let url = reqwest::Url::parse(rpc_url)
            .map_err(|e| Error::Config(format!("Invalid RPC URL: {}", e)))?;
        let provider = ProviderBuilder::new().on_http(url);

        Ok(Self { provider, chain_id })
    }

    /// Chain ID this client signs for
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Ask the node which chain it serves (`eth_chainId`)
    pub async fn remote_chain_id(&self) -> Result<u64, Error> {
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| EvmError::RpcError(e.to_string()))?;
        Ok(chain_id)
    }

    /// Execute a read-only contract call
    pub async fn call(&self, request: EvmCallRequest) -> Result<Vec<u8>, Error> {
        let tx_request = TransactionRequest {
            to: Some(TxKind::Call(request.to.0)),
            input: request.data.into(),
            ..Default::default()
        };

        let result = self
            .provider
            .call(&tx_request)
            .await
            .map_err(|e| EvmError::RpcError(e.to_string()))?;

        Ok(result.to_vec())
    }

    /// Call a contract method (read-only) and decode its return value
    pub async fn call_contract<T: SolCall>(
        &self,
        contract_address: Address,
        call: T,
    ) -> Result<T::Return, Error> {
        let request = EvmCallRequest::new(EthAddress(contract_address), call.abi_encode());
        let result = self.call(request).await?;
        let decoded = T::abi_decode_returns(&result, false).map_err(|e| {
            EvmError::AbiError(format!("Failed to decode contract call result: {}", e))
        })?;
        Ok(decoded)
    }

    /// Get EIP-1559 fee data as (base fee, priority fee)
    pub async fn get_fee_data(&self) -> Result<(U256, U256), Error> {
        let fee_history = self
            .provider
            .get_fee_history(1, BlockNumberOrTag::Latest, &[50.0])
            .await
            .map_err(|e| EvmError::RpcError(e.to_string()))?;

        if let (Some(base_fee), Some(reward)) = (
            fee_history.base_fee_per_gas.last(),
            fee_history
                .reward
                .as_ref()
                .and_then(|r| r.last())
                .and_then(|r| r.first()),
        ) {
            Ok((U256::from(*base_fee), U256::from(*reward)))
        } else {
            let gas_price = self
                .provider
                .get_gas_price()
                .await
                .map_err(|e| EvmError::RpcError(e.to_string()))?;
            let gas_price = U256::from(gas_price);
            Ok((gas_price, gas_price / U256::from(10)))
        }
    }

    /// Sign and submit a contract call, returning the transaction hash.
    ///
    /// A revert during gas estimation surfaces as
    /// [`EvmError::GasEstimationError`] carrying the node's revert message.
    pub async fn send_contract_call<T: SolCall>(
        &self,
        contract_address: Address,
        call: T,
        signer: &dyn TransactionSigner,
        value: Option<U256>,
        gas_buffer_percent: Option<u64>,
    ) -> Result<B256, Error> {
        let from = signer.address();
        let data: Bytes = call.abi_encode().into();
        let value = value.unwrap_or(U256::ZERO);

        let nonce = self
            .provider
            .get_transaction_count(from)
            .await
            .map_err(|e| EvmError::RpcError(e.to_string()))?;

        let estimate_request = TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(contract_address)),
            value: Some(value),
            input: data.clone().into(),
            ..Default::default()
        };
        let estimated = self
            .provider
            .estimate_gas(&estimate_request)
            .await
            .map_err(|e| EvmError::GasEstimationError(e.to_string()))?;
        let estimated = u64::try_from(estimated)
            .map_err(|_| EvmError::GasEstimationError("gas estimate overflows u64".to_string()))?;

        let buffer = gas_buffer_percent.unwrap_or(DEFAULT_GAS_BUFFER_PERCENT);
        let gas_limit = estimated.saturating_add(estimated.saturating_mul(buffer) / 100);

        let (base_fee, tip) = self.get_fee_data().await?;
        let tip = tip.saturating_to::<u128>();
        let max_fee = base_fee
            .saturating_to::<u128>()
            .saturating_mul(2)
            .saturating_add(tip);

        let tx = Eip1559Transaction::contract_call(self.chain_id, nonce, contract_address, data)
            .value(value)
            .gas_limit(gas_limit)
            .fees(max_fee, tip);
        debug!(
            "Submitting call to {} from {} (nonce {}, gas {}, value {})",
            contract_address, from, nonce, gas_limit, value
        );

        let signed = signer.sign_eip1559(&tx)?;
        let pending = self
            .provider
            .send_raw_transaction(signed.raw())
            .await
            .map_err(|e| EvmError::TransactionError(e.to_string()))?;

        let tx_hash = *pending.tx_hash();
        info!("Submitted transaction {}", tx_hash);
        Ok(tx_hash)
    }

    /// Poll for a receipt until the transaction is mined.
    ///
    /// A mined transaction with failed status is reported as
    /// [`EvmError::TransactionReverted`].
    pub async fn wait_for_receipt(
        &self,
        tx_hash: B256,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Result<TxConfirmation, Error> {
        for attempt in 0..max_attempts.max(1) {
            let receipt = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| EvmError::RpcError(e.to_string()))?;

            if let Some(receipt) = receipt {
                if !receipt.status() {
                    return Err(EvmError::TransactionReverted(format!(
                        "transaction {} reverted on-chain",
                        tx_hash
                    ))
                    .into());
                }
                return Ok(TxConfirmation {
                    tx_hash,
                    block_number: receipt.block_number,
                });
            }

            debug!(
                "Transaction {} not mined yet (attempt {}/{})",
                tx_hash,
                attempt + 1,
                max_attempts
            );
            tokio::time::sleep(poll_interval).await;
        }

        Err(EvmError::ReceiptTimeout(tx_hash.to_string()).into())
    }
}

impl std::fmt::Debug for EvmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvmClient")
            .field("chain_id", &self.chain_id)
            .finish()
    }
}
