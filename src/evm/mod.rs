/// EVM support for the sale controller
///
/// # Features
///
/// - Read-only contract calls via `eth_call`
/// - Contract writes signed locally and priced with the EIP-1559 fee market
/// - Receipt polling for submitted transactions
/// - `sol!` bindings for the Crypto Devs sale contract
pub mod client;
pub mod contracts;
pub mod tx;
pub mod types;

pub use client::{EvmClient, TxConfirmation};
pub use contracts::CryptoDevs;
pub use types::{EthAddress, EvmError};
