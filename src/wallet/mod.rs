// Allow deprecated Signature for compatibility with alloy-consensus ecosystem
#![allow(deprecated)]

use alloy_primitives::{Address, Signature, B256};
use bip32::DerivationPath;
use bip39::Mnemonic;
use k256::ecdsa::SigningKey as K256SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use secrecy::{ExposeSecret, SecretString};
use sha3::{digest::FixedOutput, Digest, Keccak256};
use std::str::FromStr;
use tiny_keccak::{Hasher, Keccak};
use zeroize::Zeroize;

use crate::error::Error;
use crate::evm::tx::{Eip1559Transaction, SignedEip1559Transaction};

// Wallet provider seam (connect / network / signer)
pub mod provider;
pub use provider::{LocalWalletProvider, WalletProvider, WatchOnlyProvider};

/// HD Path prefix for Ethereum chains (BIP-44)
const ETHEREUM_HD_PATH: &str = "m/44'/60'/0'/0/";

/// Anything that can sign the sale contract's EIP-1559 transactions
pub trait TransactionSigner: Send + Sync {
    /// Account the signatures recover to
    fn address(&self) -> Address;

    /// Sign an EIP-1559 transaction and return the full signed payload
    fn sign_eip1559(&self, tx: &Eip1559Transaction) -> Result<SignedEip1559Transaction, Error>;
}

/// Mnemonic-backed EVM wallet
pub struct LocalWallet {
    /// Local secp256k1 signer
    signer: K256SigningKey,
    /// Cached account address
    address: Address,
    /// Account index used for derivation
    account_index: u32,
}

// Note: LocalWallet intentionally does not implement Clone; share it via Arc

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .field("account_index", &self.account_index)
            .finish()
    }
}

impl LocalWallet {
    /// Create a wallet from a BIP-39 mnemonic at `m/44'/60'/0'/0/{account_index}`
    pub fn from_mnemonic(mnemonic: &SecretString, account_index: u32) -> Result<Self, Error> {
        let mnemonic = Mnemonic::from_str(mnemonic.expose_secret())
            .map_err(|e| Error::Wallet(format!("Invalid mnemonic: {}", e)))?;

        let mut seed_bytes = mnemonic.to_seed("");
        let seed = bip32::Seed::new(seed_bytes);
        seed_bytes.zeroize();

        let path = format!("{}{}", ETHEREUM_HD_PATH, account_index);
        let path = DerivationPath::from_str(&path)
            .map_err(|e| Error::Wallet(format!("Invalid Ethereum derivation path: {}", e)))?;

        let derived_key = bip32::XPrv::derive_from_path(seed.as_bytes(), &path)
            .map_err(|e| Error::Wallet(format!("Key derivation error: {}", e)))?;

        let mut key_bytes = derived_key.to_bytes();
        let signer = K256SigningKey::from_slice(&key_bytes)
            .map_err(|e| Error::Wallet(format!("Failed to create EVM signing key: {}", e)));
        key_bytes.zeroize();
        let signer = signer?;

        let address = address_from_key(&signer)?;

        Ok(Self {
            signer,
            address,
            account_index,
        })
    }

    /// Get the account address
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn account_index(&self) -> u32 {
        self.account_index
    }

    fn sign_with_keccak<F>(&self, builder: F) -> Result<(Signature, B256), Error>
    where
        F: FnOnce(&mut Keccak256),
    {
        let mut digest = Keccak256::new();
        builder(&mut digest);

        let hash_bytes: [u8; 32] = digest.clone().finalize_fixed().into();

        let (sig, recid) = self
            .signer
            .sign_digest_recoverable(digest)
            .map_err(|e| Error::Wallet(format!("Failed to sign digest: {}", e)))?;

        Ok((Signature::from((sig, recid)), B256::from(hash_bytes)))
    }

    /// Sign an EIP-1559 transaction and return the full signed payload
    pub fn sign_eip1559(
        &self,
        tx: &Eip1559Transaction,
    ) -> Result<SignedEip1559Transaction, Error> {
        let encoded = tx.encoded_for_signing();
        let (signature, _) = self.sign_with_keccak(|d| d.update(&encoded))?;
        Ok(tx.clone().into_signed(signature))
    }
}

impl TransactionSigner for LocalWallet {
    fn address(&self) -> Address {
        self.address
    }

    fn sign_eip1559(&self, tx: &Eip1559Transaction) -> Result<SignedEip1559Transaction, Error> {
        LocalWallet::sign_eip1559(self, tx)
    }
}

/// Keccak-256 of the uncompressed public key (minus the 0x04 prefix), last 20 bytes
fn address_from_key(signer: &K256SigningKey) -> Result<Address, Error> {
    let point = signer.verifying_key().to_encoded_point(false);
    let pubkey_bytes = point.as_bytes();

    if pubkey_bytes.len() != 65 || pubkey_bytes[0] != 0x04 {
        return Err(Error::Wallet(
            "Invalid public key format for Ethereum address derivation".to_string(),
        ));
    }

    let mut hasher = Keccak::v256();
    hasher.update(&pubkey_bytes[1..]);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);

    Ok(Address::from_slice(&hash[12..]))
}
