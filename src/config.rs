//! Layered configuration.
//!
//! Built-in defaults, then an optional TOML file, then `SALE_*` environment
//! variables (`__` separates nested keys, e.g. `SALE_NETWORK__RPC_URL`).

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy_primitives::U256;
use config::{Config as ConfigLoader, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Error;
use crate::evm::types::{utils::ether_to_wei, EthAddress};
use crate::sale::SaleFees;

const ENV_PREFIX: &str = "SALE";
const ENV_CONFIG_PATH: &str = "SALE_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/sale.toml";

/// Network the sale contract lives on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Human readable name, used in wrong-network notices
    pub name: String,
    /// The only chain id the controller accepts
    pub chain_id: u64,
    pub rpc_url: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            name: "goerli".to_string(),
            chain_id: 5,
            rpc_url: "https://rpc.ankr.com/eth_goerli".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    /// Deployed sale contract address (0x-prefixed)
    pub address: String,
}

/// Fixed sale economics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomicsConfig {
    /// Presale mint price in ether
    pub presale_fee: String,
    /// Public mint price in ether
    pub public_fee: String,
    /// Supply cap, display only
    pub max_supply: u64,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            presale_fee: "0.01".to_string(),
            public_fee: "0.02".to_string(),
            max_supply: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between sale refreshes
    pub interval_secs: u64,
    /// Milliseconds between receipt lookups
    pub confirmation_poll_ms: u64,
    /// Receipt lookups before giving up on a transaction
    pub confirmation_attempts: u32,
    /// Seconds a single contract read may take before the refresh gives up
    pub request_timeout_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            confirmation_poll_ms: 2_000,
            confirmation_attempts: 90,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` wins when set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Complete controller configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleConfig {
    pub network: NetworkConfig,
    pub contract: ContractConfig,
    pub economics: EconomicsConfig,
    pub polling: PollingConfig,
    pub logging: LoggingConfig,
}

impl SaleConfig {
    /// Load from `SALE_CONFIG_PATH` (or `config/sale.toml`) and the environment
    pub fn load() -> Result<Self, Error> {
        let path = env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(path)
    }

    /// Load from the given file (missing is fine) and the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Error> {
        let config = Self::build(path.as_ref(), None)?;
        config.validate()?;
        Ok(config)
    }

    fn build(path: &Path, env_source: Option<HashMap<String, String>>) -> Result<Self, Error> {
        debug!("Loading sale configuration from {}", path.display());

        let settings = ConfigLoader::builder()
            .add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env_source),
            )
            .build()
            .map_err(|e| Error::Config(format!("Failed to read configuration: {}", e)))?;

        settings
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), Error> {
        if self.network.chain_id == 0 {
            return Err(Error::Config("Chain id must be non-zero".to_string()));
        }

        url::Url::parse(&self.network.rpc_url).map_err(|e| {
            Error::Config(format!("Invalid RPC URL '{}': {}", self.network.rpc_url, e))
        })?;

        if self.contract.address.trim().is_empty() {
            return Err(Error::Config(
                "Contract address is not set (contract.address / SALE_CONTRACT__ADDRESS)"
                    .to_string(),
            ));
        }
        self.contract_address()?;

        if self.polling.interval_secs == 0 {
            return Err(Error::Config("Poll interval must be at least 1 second".to_string()));
        }
        if self.polling.request_timeout_secs == 0 {
            return Err(Error::Config(
                "Request timeout must be at least 1 second".to_string(),
            ));
        }
        if self.polling.confirmation_attempts == 0 {
            return Err(Error::Config(
                "Confirmation attempts must be at least 1".to_string(),
            ));
        }

        if self.economics.max_supply == 0 {
            return Err(Error::Config("Max supply must be non-zero".to_string()));
        }
        self.fees()?;

        Ok(())
    }

    pub fn contract_address(&self) -> Result<EthAddress, Error> {
        EthAddress::parse(self.contract.address.trim())
    }

    /// Mint prices in wei; presale must be strictly cheaper than public
    pub fn fees(&self) -> Result<SaleFees, Error> {
        let presale_wei = ether_to_wei(&self.economics.presale_fee)?;
        let public_wei = ether_to_wei(&self.economics.public_fee)?;

        if presale_wei == U256::ZERO {
            return Err(Error::Config("Presale fee must be non-zero".to_string()));
        }
        if presale_wei >= public_wei {
            return Err(Error::Config(format!(
                "Presale fee ({} ether) must be below the public fee ({} ether)",
                self.economics.presale_fee, self.economics.public_fee
            )));
        }

        Ok(SaleFees {
            presale_wei,
            public_wei,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    pub fn confirmation_poll(&self) -> Duration {
        Duration::from_millis(self.polling.confirmation_poll_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.polling.request_timeout_secs)
    }
}
