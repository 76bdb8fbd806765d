//! Test fixtures for the sale controller
//!
//! In-memory stand-ins for the sale contract and the wallet extension so the
//! controller can be driven without an RPC node.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;

use cryptodevs_sale::evm::client::TxConfirmation;
use cryptodevs_sale::evm::tx::{Eip1559Transaction, SignedEip1559Transaction};
use cryptodevs_sale::{
    ChainHandle, ConnectionError, ContractGateway, Error, ManualClock, PendingWrite, ReadError,
    SaleConfig, SaleController, SigningHandle, TransactionSigner, WalletProvider, WriteError,
};

pub const CHAIN_ID: u64 = 5;
pub const NOW: u64 = 1_700_000_000;
pub const MOCK_CONTRACT_ADDR: &str = "0x1111111111111111111111111111111111111111";
/// Matches the default `polling.request_timeout_secs`
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Long enough that only the request timeout ends the read
pub const HUNG: Duration = Duration::from_secs(10 * 24 * 3600);

pub fn owner() -> Address {
    Address::repeat_byte(0xaa)
}

pub fn buyer() -> Address {
    Address::repeat_byte(0xbb)
}

pub fn presale_fee() -> U256 {
    U256::from(10_000_000_000_000_000u64)
}

pub fn public_fee() -> U256 {
    U256::from(20_000_000_000_000_000u64)
}

pub fn test_config() -> SaleConfig {
    let mut config = SaleConfig::default();
    config.contract.address = MOCK_CONTRACT_ADDR.to_string();
    config
}

/// Contract state and failure switches
#[derive(Debug, Clone)]
pub struct MockChain {
    pub presale_started: bool,
    pub presale_end: U256,
    pub minted: U256,
    pub owner: Address,
    /// End timestamp set when `startPresale` is mined
    pub end_after_start: U256,
    pub fail_started: bool,
    pub fail_minted: bool,
    pub fail_end_timestamp: bool,
    pub fail_owner: bool,
    /// Revert reason for every submitted write
    pub revert_with: Option<String>,
    pub fees_paid: Vec<U256>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            presale_started: false,
            presale_end: U256::ZERO,
            minted: U256::ZERO,
            owner: owner(),
            end_after_start: U256::from(NOW + 300),
            fail_started: false,
            fail_minted: false,
            fail_end_timestamp: false,
            fail_owner: false,
            revert_with: None,
            fees_paid: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum MockWrite {
    StartPresale,
    Mint,
}

/// Sale contract fake with call counters
#[derive(Default)]
pub struct MockGateway {
    chain: Mutex<MockChain>,
    pending: Mutex<Vec<(B256, MockWrite)>>,
    pub refreshes: AtomicUsize,
    pub reads: AtomicUsize,
    pub submissions: AtomicUsize,
    in_flight_writes: AtomicUsize,
    pub max_in_flight_writes: AtomicUsize,
    read_delay_ms: AtomicU64,
    confirm_delay_ms: AtomicU64,
}

impl MockGateway {
    pub fn new(chain: MockChain) -> Arc<Self> {
        Arc::new(Self {
            chain: Mutex::new(chain),
            ..Default::default()
        })
    }

    pub fn update(&self, f: impl FnOnce(&mut MockChain)) {
        f(&mut self.chain.lock().unwrap());
    }

    pub fn chain(&self) -> MockChain {
        self.chain.lock().unwrap().clone()
    }

    pub fn set_read_delay(&self, delay: Duration) {
        self.read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set_confirm_delay(&self, delay: Duration) {
        self.confirm_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    async fn read<T>(
        &self,
        handle: &ChainHandle,
        f: impl FnOnce(&MockChain) -> Result<T, ReadError>,
    ) -> Result<T, ReadError> {
        if !handle.is_live() {
            return Err(ReadError::NotConnected);
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        let delay = self.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let chain = self.chain.lock().unwrap().clone();
        f(&chain)
    }

    fn submit(
        &self,
        signer: &SigningHandle,
        write: MockWrite,
        fee: Option<U256>,
    ) -> Result<PendingWrite, WriteError> {
        if !signer.is_live() {
            return Err(WriteError::NotConnected);
        }
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_hash = B256::with_last_byte(n as u8);

        let in_flight = self.in_flight_writes.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight_writes
            .fetch_max(in_flight, Ordering::SeqCst);

        if let Some(fee) = fee {
            self.chain.lock().unwrap().fees_paid.push(fee);
        }
        self.pending.lock().unwrap().push((tx_hash, write));
        Ok(PendingWrite { tx_hash })
    }
}

fn unavailable() -> ReadError {
    ReadError::RemoteUnavailable("mock node down".to_string())
}

#[async_trait]
impl ContractGateway for MockGateway {
    async fn is_presale_started(&self, handle: &ChainHandle) -> Result<bool, ReadError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        self.read(handle, |c| {
            if c.fail_started {
                Err(unavailable())
            } else {
                Ok(c.presale_started)
            }
        })
        .await
    }

    async fn presale_end_timestamp(&self, handle: &ChainHandle) -> Result<U256, ReadError> {
        self.read(handle, |c| {
            if c.fail_end_timestamp {
                Err(unavailable())
            } else {
                Ok(c.presale_end)
            }
        })
        .await
    }

    async fn minted_count(&self, handle: &ChainHandle) -> Result<U256, ReadError> {
        self.read(handle, |c| {
            if c.fail_minted {
                Err(unavailable())
            } else {
                Ok(c.minted)
            }
        })
        .await
    }

    async fn owner_address(&self, handle: &ChainHandle) -> Result<Address, ReadError> {
        self.read(handle, |c| {
            if c.fail_owner {
                Err(unavailable())
            } else {
                Ok(c.owner)
            }
        })
        .await
    }

    async fn start_presale(&self, signer: &SigningHandle) -> Result<PendingWrite, WriteError> {
        self.submit(signer, MockWrite::StartPresale, None)
    }

    async fn presale_mint(
        &self,
        signer: &SigningHandle,
        fee_wei: U256,
    ) -> Result<PendingWrite, WriteError> {
        self.submit(signer, MockWrite::Mint, Some(fee_wei))
    }

    async fn public_mint(
        &self,
        signer: &SigningHandle,
        fee_wei: U256,
    ) -> Result<PendingWrite, WriteError> {
        self.submit(signer, MockWrite::Mint, Some(fee_wei))
    }

    async fn confirm(&self, pending: &PendingWrite) -> Result<TxConfirmation, WriteError> {
        let delay = self.confirm_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.in_flight_writes.fetch_sub(1, Ordering::SeqCst);

        let write = self
            .pending
            .lock()
            .unwrap()
            .iter()
            .find(|(hash, _)| *hash == pending.tx_hash)
            .map(|(_, write)| *write)
            .expect("confirming an unknown transaction");

        let mut chain = self.chain.lock().unwrap();
        if let Some(reason) = &chain.revert_with {
            return Err(WriteError::RemoteRejected(reason.clone()));
        }
        match write {
            MockWrite::StartPresale => {
                chain.presale_started = true;
                chain.presale_end = chain.end_after_start;
            }
            MockWrite::Mint => chain.minted += U256::from(1),
        }

        Ok(TxConfirmation {
            tx_hash: pending.tx_hash,
            block_number: Some(1),
        })
    }
}

/// Signer that is never asked to sign; the mock gateway doesn't build transactions
pub struct MockSigner {
    address: Address,
}

impl TransactionSigner for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_eip1559(&self, _tx: &Eip1559Transaction) -> Result<SignedEip1559Transaction, Error> {
        Err(Error::Wallet("mock signer cannot sign".to_string()))
    }
}

/// Wallet extension fake
pub struct MockWallet {
    account: Mutex<Address>,
    chain_id: AtomicU64,
    reject_connect: AtomicBool,
    reject_signer: AtomicBool,
    pub connects: AtomicUsize,
}

impl MockWallet {
    pub fn new(account: Address) -> Arc<Self> {
        Arc::new(Self {
            account: Mutex::new(account),
            chain_id: AtomicU64::new(CHAIN_ID),
            reject_connect: AtomicBool::new(false),
            reject_signer: AtomicBool::new(false),
            connects: AtomicUsize::new(0),
        })
    }

    pub fn switch_network(&self, chain_id: u64) {
        self.chain_id.store(chain_id, Ordering::SeqCst);
    }

    pub fn switch_account(&self, account: Address) {
        *self.account.lock().unwrap() = account;
    }

    pub fn reject_connect(&self, reject: bool) {
        self.reject_connect.store(reject, Ordering::SeqCst);
    }

    pub fn reject_signer(&self, reject: bool) {
        self.reject_signer.store(reject, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn connect(&self) -> Result<Address, ConnectionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.reject_connect.load(Ordering::SeqCst) {
            return Err(ConnectionError::UserRejected);
        }
        Ok(*self.account.lock().unwrap())
    }

    async fn network(&self) -> Result<u64, ConnectionError> {
        Ok(self.chain_id.load(Ordering::SeqCst))
    }

    async fn signer(&self) -> Result<Arc<dyn TransactionSigner>, ConnectionError> {
        if self.reject_signer.load(Ordering::SeqCst) {
            return Err(ConnectionError::UserRejected);
        }
        Ok(Arc::new(MockSigner {
            address: *self.account.lock().unwrap(),
        }))
    }
}

/// Controller wired to fakes
pub struct Harness {
    pub controller: Arc<SaleController>,
    pub gateway: Arc<MockGateway>,
    pub wallet: Arc<MockWallet>,
    pub clock: Arc<ManualClock>,
}

pub fn harness(account: Address, chain: MockChain) -> Harness {
    let gateway = MockGateway::new(chain);
    let wallet = MockWallet::new(account);
    let clock = Arc::new(ManualClock::new(NOW));

    let controller = SaleController::new(
        &test_config(),
        wallet.clone(),
        gateway.clone(),
        clock.clone(),
    )
    .expect("test config is valid");

    Harness {
        controller: Arc::new(controller),
        gateway,
        wallet,
        clock,
    }
}

pub fn presale_open() -> MockChain {
    MockChain {
        presale_started: true,
        presale_end: U256::from(NOW + 3600),
        minted: U256::from(3),
        ..Default::default()
    }
}

pub fn sale_ended() -> MockChain {
    MockChain {
        presale_started: true,
        presale_end: U256::from(NOW - 10),
        minted: U256::from(12),
        ..Default::default()
    }
}
