use crate::evm::types::EvmError;
use thiserror::Error;

/// Crate-level error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error(transparent)]
    Evm(#[from] EvmError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while acquiring a chain handle or a signer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("Connection request rejected by the user")]
    UserRejected,

    #[error("Wrong network: expected chain id {expected}, wallet is on {actual}")]
    WrongNetwork { expected: u64, actual: u64 },

    #[error("Wallet did not provide a signer")]
    NoSigner,

    #[error("Not connected")]
    NotConnected,

    #[error("Wallet provider unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the side-effect-free contract reads
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("Not connected")]
    NotConnected,

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),
}

/// Failures of a dispatched write action
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error("Transaction rejected by the user")]
    UserRejected,

    #[error("Transaction rejected by the contract: {0}")]
    RemoteRejected(String),

    /// The local signer could not produce a signature
    #[error("Failed to sign transaction: {0}")]
    SigningFailed(String),

    #[error("Not connected")]
    NotConnected,

    #[error("Another action is already pending")]
    AlreadyPending,

    #[error("Wrong network: expected chain id {expected}, wallet is on {actual}")]
    WrongNetwork { expected: u64, actual: u64 },

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),
}

impl From<ConnectionError> for WriteError {
    fn from(err: ConnectionError) -> Self {
        match err {
            ConnectionError::UserRejected | ConnectionError::NoSigner => WriteError::UserRejected,
            ConnectionError::WrongNetwork { expected, actual } => {
                WriteError::WrongNetwork { expected, actual }
            }
            ConnectionError::NotConnected => WriteError::NotConnected,
            ConnectionError::Unavailable(msg) => WriteError::RemoteUnavailable(msg),
        }
    }
}
