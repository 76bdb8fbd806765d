// Allow deprecated Signature for compatibility with alloy-consensus ecosystem
#![allow(deprecated)]

use alloy_consensus::{SignableTransaction, Signed, TxEip1559};
use alloy_eips::eip2930::AccessList;
use alloy_primitives::{Address, Bytes, ChainId, Signature, TxKind, B256, U256};

/// Builder for the EIP-1559 transactions the sale contract writes use.
#[derive(Clone, Debug, PartialEq)]
pub struct Eip1559Transaction {
    pub chain_id: ChainId,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

impl Eip1559Transaction {
    /// Contract call with zero fees; price it with [`Self::fees`] before signing.
    pub fn contract_call(chain_id: u64, nonce: u64, to: Address, data: Bytes) -> Self {
        Self {
            chain_id,
            nonce,
            gas_limit: 21_000,
            max_fee_per_gas: 0,
            max_priority_fee_per_gas: 0,
            to,
            value: U256::ZERO,
            data,
        }
    }

    /// Set the value (in wei) attached to the call, e.g. a mint fee.
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// Set max fee and priority tip per gas (wei).
    pub fn fees(mut self, max_fee: u128, tip: u128) -> Self {
        self.max_fee_per_gas = max_fee;
        self.max_priority_fee_per_gas = tip;
        self
    }

    fn to_alloy(&self) -> TxEip1559 {
        TxEip1559 {
            chain_id: self.chain_id,
            nonce: self.nonce,
            gas_limit: self.gas_limit,
            max_fee_per_gas: self.max_fee_per_gas,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            to: TxKind::Call(self.to),
            value: self.value,
            access_list: AccessList::default(),
            input: self.data.clone(),
        }
    }

    /// Bytes that should be hashed (keccak256) for signing.
    pub fn encoded_for_signing(&self) -> Vec<u8> {
        self.to_alloy().encoded_for_signing()
    }

    pub fn signature_hash(&self) -> B256 {
        self.to_alloy().signature_hash()
    }

    /// Combine with a signature into the signed form plus raw payload.
    pub fn into_signed(self, signature: Signature) -> SignedEip1559Transaction {
        let tx = self.to_alloy();
        let mut buf = Vec::with_capacity(tx.encoded_len_with_signature(&signature, false));
        tx.encode_with_signature(&signature, &mut buf, false);
        SignedEip1559Transaction {
            signed: tx.into_signed(signature),
            raw: Bytes::from(buf),
        }
    }
}

/// Fully signed transaction and its raw payload.
#[derive(Clone, Debug)]
pub struct SignedEip1559Transaction {
    signed: Signed<TxEip1559>,
    raw: Bytes,
}

impl SignedEip1559Transaction {
    /// Raw bytes ready to be sent via `eth_sendRawTransaction`.
    pub fn raw(&self) -> &Bytes {
        &self.raw
    }

    pub fn hash(&self) -> B256 {
        *self.signed.hash()
    }

    pub fn signature(&self) -> &Signature {
        self.signed.signature()
    }
}
