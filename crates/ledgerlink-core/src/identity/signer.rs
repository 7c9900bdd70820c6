//! Signing capability supplied by the caller
//!
//! The wallet layer is outside this crate; everything here needs only an
//! account id, its Ed25519 public key, and the ability to sign transaction
//! bodies. [`AccountSigner`] is the in-process implementation backed by an
//! `ed25519-dalek` key.

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use rand::RngCore;

use crate::error::{LinkError, LinkResult};
use crate::types::{AccountId, ChannelId};

/// Capability to sign ledger transactions on behalf of one account
pub trait LedgerSigner: Send + Sync {
    /// Account the signatures are made for
    fn account_id(&self) -> &AccountId;

    /// Public key the ledger knows for this account
    fn public_key(&self) -> VerifyingKey;

    /// Sign a transaction body
    fn sign(&self, body: &[u8]) -> Signature;
}

/// Ed25519-backed signer for a single account
pub struct AccountSigner {
    account_id: AccountId,
    key: SigningKey,
}

impl AccountSigner {
    /// Generate a signer with a fresh random key
    pub fn generate(account_id: impl Into<AccountId>) -> Self {
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        Self::from_seed(account_id, &seed)
    }

    /// Build a signer from a 32-byte Ed25519 seed
    pub fn from_seed(account_id: impl Into<AccountId>, seed: &[u8; 32]) -> Self {
        Self {
            account_id: account_id.into(),
            key: SigningKey::from_bytes(seed),
        }
    }

    /// Build a signer from a hex-encoded 32-byte seed
    pub fn from_hex_seed(account_id: impl Into<AccountId>, seed_hex: &str) -> LinkResult<Self> {
        let bytes = hex::decode(seed_hex)
            .map_err(|e| LinkError::Identity(format!("Invalid key hex: {}", e)))?;
        let seed: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| LinkError::Identity(format!("Key seed must be 32 bytes, got {}", bytes.len())))?;
        Ok(Self::from_seed(account_id, &seed))
    }

    /// Export the 32-byte seed
    pub fn to_seed(&self) -> [u8; 32] {
        self.key.to_bytes()
    }
}

impl LedgerSigner for AccountSigner {
    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    fn public_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    fn sign(&self, body: &[u8]) -> Signature {
        self.key.sign(body)
    }
}

impl std::fmt::Debug for AccountSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSigner")
            .field("account_id", &self.account_id)
            .field("public_key", &hex::encode(self.key.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

/// Body signed when submitting a message to a channel
///
/// Format: channel_id || 0x00 || payload
pub fn submission_body(channel_id: &ChannelId, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(channel_id.as_str().len() + 1 + payload.len());
    body.extend_from_slice(channel_id.as_str().as_bytes());
    body.push(0);
    body.extend_from_slice(payload);
    body
}

/// Body signed when updating an account memo
///
/// Format: account_id || 0x00 || memo
pub fn memo_update_body(account_id: &AccountId, memo: &str) -> Vec<u8> {
    let mut body = Vec::with_capacity(account_id.as_str().len() + 1 + memo.len());
    body.extend_from_slice(account_id.as_str().as_bytes());
    body.push(0);
    body.extend_from_slice(memo.as_bytes());
    body
}

/// Verify a signature against a key
pub fn verify_signature(key: &VerifyingKey, body: &[u8], signature: &Signature) -> bool {
    key.verify(body, signature).is_ok()
}
