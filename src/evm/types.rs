/// EVM-specific types and utilities
///
/// Address handling, read-call requests, EVM error definitions and the
/// ether/wei conversions used for the fixed sale fees.
use crate::error::Error;
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Ethereum address wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EthAddress(pub Address);

impl EthAddress {
    /// Parse an address from a `0x`-prefixed hex string
    pub fn parse(s: &str) -> Result<Self, Error> {
        let trimmed = s.trim();
        if !trimmed.starts_with("0x") || trimmed.len() != 42 {
            return Err(Error::Config(format!(
                "Invalid Ethereum address '{}': expected 0x followed by 40 hex characters",
                trimmed
            )));
        }
        let addr = Address::from_str(trimmed)
            .map_err(|e| Error::Config(format!("Invalid Ethereum address: {}", e)))?;
        Ok(Self(addr))
    }

    /// Get the underlying alloy Address
    pub fn inner(&self) -> &Address {
        &self.0
    }

    /// Convert to EIP-55 checksummed hex string
    pub fn to_checksummed_string(&self) -> String {
        self.0.to_checksum(None)
    }

    /// Address equality is byte-wise, so hex casing never matters here
    pub fn same_account(&self, other: &Address) -> bool {
        self.0 == *other
    }
}

impl std::fmt::Display for EthAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_checksummed_string())
    }
}

impl From<Address> for EthAddress {
    fn from(addr: Address) -> Self {
        Self(addr)
    }
}

impl From<EthAddress> for Address {
    fn from(addr: EthAddress) -> Self {
        addr.0
    }
}

/// EVM request for read-only calls
#[derive(Debug, Clone)]
pub struct EvmCallRequest {
    /// Target contract address
    pub to: EthAddress,
    /// Call data (encoded function call)
    pub data: Vec<u8>,
}

impl EvmCallRequest {
    pub fn new(to: EthAddress, data: Vec<u8>) -> Self {
        Self { to, data }
    }
}

/// EVM-specific errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum EvmError {
    #[error("ABI encoding/decoding error: {0}")]
    AbiError(String),

    #[error("RPC error: {0}")]
    RpcError(String),

    #[error("Transaction failed: {0}")]
    TransactionError(String),

    #[error("Gas estimation failed: {0}")]
    GasEstimationError(String),

    #[error("Transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("Transaction {0} was not mined in time")]
    ReceiptTimeout(String),
}

impl EvmError {
    /// Whether the error is the contract refusing the call, as opposed to
    /// the node or transport failing
    pub fn is_revert(&self) -> bool {
        match self {
            EvmError::TransactionReverted(_) => true,
            EvmError::GasEstimationError(msg) => msg.to_lowercase().contains("revert"),
            _ => false,
        }
    }
}

/// Utility functions for EVM amounts
pub mod utils {
    use super::*;

    const WEI_PER_ETHER_DECIMALS: u64 = 18;

    fn wei_multiplier() -> U256 {
        U256::from(10u64).pow(U256::from(WEI_PER_ETHER_DECIMALS))
    }

    /// Convert wei to ether (display only)
    pub fn wei_to_ether(wei: U256) -> f64 {
        let ether_wei = wei / wei_multiplier();
        let remainder_wei = wei % wei_multiplier();

        let ether_int = ether_wei.to_string().parse::<f64>().unwrap_or(0.0);
        let remainder = remainder_wei.to_string().parse::<f64>().unwrap_or(0.0);

        ether_int + (remainder / 1_000_000_000_000_000_000.0)
    }

    /// Convert a decimal ether amount to wei with integer arithmetic
    pub fn ether_to_wei(ether: &str) -> Result<U256, Error> {
        let ether_str = ether.trim();
        let (integer_part, decimal_part) = match ether_str.find('.') {
            Some(dot_pos) => (&ether_str[..dot_pos], &ether_str[dot_pos + 1..]),
            None => (ether_str, ""),
        };

        // Plain decimal only: no sign, exponent, separators or 0x prefix
        let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if (integer_part.is_empty() && decimal_part.is_empty())
            || !is_digits(integer_part)
            || !is_digits(decimal_part)
        {
            return Err(Error::Config(format!("Invalid ether amount: '{}'", ether)));
        }

        if decimal_part.len() > WEI_PER_ETHER_DECIMALS as usize {
            return Err(Error::Config(format!(
                "Ether amount '{}' has more than 18 decimal places",
                ether_str
            )));
        }

        let int_value = if integer_part.is_empty() {
            U256::ZERO
        } else {
            U256::from_str(integer_part).map_err(|_| {
                Error::Config(format!(
                    "Invalid integer part in ether amount: {}",
                    integer_part
                ))
            })?
        };

        let dec_value = if decimal_part.is_empty() {
            U256::ZERO
        } else {
            U256::from_str(decimal_part).map_err(|_| {
                Error::Config(format!(
                    "Invalid decimal part in ether amount: {}",
                    decimal_part
                ))
            })?
        };

        let decimal_multiplier = U256::from(10u64).pow(U256::from(
            WEI_PER_ETHER_DECIMALS - decimal_part.len() as u64,
        ));

        Ok(int_value * wei_multiplier() + dec_value * decimal_multiplier)
    }
}
