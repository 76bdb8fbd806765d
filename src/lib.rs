pub mod config;
pub mod connection;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod evm;
pub mod gateway;
pub mod notice;
pub mod sale;
pub mod wallet;

// Main controller exports
pub use config::SaleConfig;
pub use controller::{SaleController, SaleView};
pub use error::{ConnectionError, Error, ReadError, WriteError};

// Session and contract seams
pub use connection::{ChainHandle, ConnectionProvider, SessionId, SigningHandle};
pub use gateway::{ContractGateway, EvmGateway, PendingWrite};
pub use wallet::{
    LocalWallet, LocalWalletProvider, TransactionSigner, WalletProvider, WatchOnlyProvider,
};

// Sale state exports
pub use dispatcher::{ActionDispatcher, ActionKind, ActionStatus};
pub use notice::{Notice, Notifier};
pub use sale::{
    Clock, EnabledAction, ManualClock, Phase, PollHandle, RefreshOutcome, SaleFees, SaleSnapshot,
    SaleState, SaleStateMachine, SystemClock,
};

// Re-export primitive types used across the public API
pub use alloy_primitives::{Address, B256, U256};
