/// EVM contract interfaces and helpers
///
/// Type-safe bindings generated with the Alloy `sol!` macro.
///
/// # Available Contracts
///
/// - **CryptoDevs**: presale/public-sale ERC-721 collection
pub mod crypto_devs;

pub use crypto_devs::{CryptoDevs, ICryptoDevs};
