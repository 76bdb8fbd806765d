/// Crypto Devs NFT sale contract helpers
///
/// Typed access to the presale/public-sale ERC-721 contract: the four views
/// the controller polls and the three state-changing entry points.
///
/// # Example
///
/// ```rust,no_run
/// use cryptodevs_sale::evm::client::EvmClient;
/// use cryptodevs_sale::evm::contracts::CryptoDevs;
/// use alloy_primitives::address;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = EvmClient::new("https://rpc.ankr.com/eth_goerli", 5)?;
/// let sale = CryptoDevs::new(client, address!("0x0000000000000000000000000000000000000001"));
///
/// if sale.presale_started().await? {
///     println!("Presale ends at {}", sale.presale_ended().await?);
/// }
/// println!("{} minted", sale.token_ids().await?);
/// # Ok(())
/// # }
/// ```
use crate::error::Error;
use crate::evm::client::{EvmClient, TxConfirmation};
use crate::wallet::TransactionSigner;
use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::sol;
use std::time::Duration;

sol! {
    #[derive(Debug)]
    interface ICryptoDevs {
        // Views
        function presaleStarted() external view returns (bool);
        /// Unix timestamp (seconds) at which the presale window closes
        function presaleEnded() external view returns (uint256);
        /// Number of tokens minted so far
        function tokenIds() external view returns (uint256);
        function owner() external view returns (address);

        // State-changing functions
        function startPresale() external;
        function presaleMint() external payable;
        function mint() external payable;
    }
}

/// Gas buffer for the owner-only presale start
const START_PRESALE_GAS_BUFFER: u64 = 20;

/// Mints touch more storage than the presale toggle
const MINT_GAS_BUFFER: u64 = 30;

/// Crypto Devs sale contract helper
#[derive(Clone, Debug)]
pub struct CryptoDevs {
    client: EvmClient,
    address: Address,
}

impl CryptoDevs {
    pub fn new(client: EvmClient, address: Address) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    // ========== View Functions ==========

    /// Whether the owner has started the presale
    pub async fn presale_started(&self) -> Result<bool, Error> {
        let call = ICryptoDevs::presaleStartedCall {};
        let result = self.client.call_contract(self.address, call).await?;
        Ok(result._0)
    }

    /// Presale end timestamp; zero until the presale starts
    pub async fn presale_ended(&self) -> Result<U256, Error> {
        let call = ICryptoDevs::presaleEndedCall {};
        let result = self.client.call_contract(self.address, call).await?;
        Ok(result._0)
    }

    /// Number of tokens minted so far
    pub async fn token_ids(&self) -> Result<U256, Error> {
        let call = ICryptoDevs::tokenIdsCall {};
        let result = self.client.call_contract(self.address, call).await?;
        Ok(result._0)
    }

    /// Contract owner (OpenZeppelin `Ownable`)
    pub async fn owner(&self) -> Result<Address, Error> {
        let call = ICryptoDevs::ownerCall {};
        let result = self.client.call_contract(self.address, call).await?;
        Ok(result._0)
    }

    // ========== State-Changing Functions ==========

    /// Start the presale (owner only)
    pub async fn start_presale(&self, signer: &dyn TransactionSigner) -> Result<B256, Error> {
        let call = ICryptoDevs::startPresaleCall {};
        self.client
            .send_contract_call(
                self.address,
                call,
                signer,
                None,
                Some(START_PRESALE_GAS_BUFFER),
            )
            .await
    }

    /// Mint during the presale window (whitelisted addresses only)
    pub async fn presale_mint(
        &self,
        fee: U256,
        signer: &dyn TransactionSigner,
    ) -> Result<B256, Error> {
        let call = ICryptoDevs::presaleMintCall {};
        self.client
            .send_contract_call(self.address, call, signer, Some(fee), Some(MINT_GAS_BUFFER))
            .await
    }

    /// Mint after the presale has ended
    pub async fn mint(&self, fee: U256, signer: &dyn TransactionSigner) -> Result<B256, Error> {
        let call = ICryptoDevs::mintCall {};
        self.client
            .send_contract_call(self.address, call, signer, Some(fee), Some(MINT_GAS_BUFFER))
            .await
    }

    /// Wait until a submitted transaction is mined
    pub async fn wait_for(
        &self,
        tx_hash: B256,
        poll_interval: Duration,
        max_attempts: u32,
    ) -> Result<TxConfirmation, Error> {
        self.client
            .wait_for_receipt(tx_hash, poll_interval, max_attempts)
            .await
    }
}
