//! Ledger access layer
//!
//! The ledger is reached through two traits that mirror how the network is
//! actually split:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  LedgerClient (consensus submit path)                           │
//! │  ├── create_channel      new topic with memo + submit policy    │
//! │  ├── submit_message      append one record, get sequence no.    │
//! │  └── update_account_memo actor metadata mutation                │
//! │                                                                 │
//! │  MirrorNode (eventually consistent read replica)                │
//! │  ├── channel_memo / channel_messages  historical reads          │
//! │  ├── subscribe           live delivery (may re-deliver)         │
//! │  └── account_memo / account_public_key                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes become visible on the mirror with a delay; callers that need to
//! observe their own writes poll (see `publish::MirrorConfirmationPoller`).

pub mod memory;

use async_trait::async_trait;
use base64::Engine as _;
use ed25519_dalek::{Signature, VerifyingKey};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::LinkResult;
use crate::identity::{verify_signature, LedgerSigner};
use crate::types::{AccountId, ChannelId, ConsensusTimestamp};

pub use memory::{InMemoryLedger, MirrorLag};

/// One record read back from a channel
///
/// `message` is the base64 text served by the read replica.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    /// Channel the record was appended to
    pub channel_id: ChannelId,
    /// Position within the channel (1-based, strictly increasing)
    pub sequence_number: u64,
    /// When consensus was reached
    pub consensus_timestamp: ConsensusTimestamp,
    /// Account that paid for the submission
    pub payer_account_id: AccountId,
    /// Base64 encoding of the submitted bytes
    pub message: String,
}

impl LedgerRecord {
    /// Decode the record's payload to text (see [`decode_payload`])
    pub fn payload_text(&self) -> String {
        decode_payload(&self.message)
    }

    /// Dedup key of this record
    pub fn key(&self) -> (ChannelId, u64) {
        (self.channel_id.clone(), self.sequence_number)
    }
}

/// Receipt returned once a submission reaches consensus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Channel the message was appended to
    pub channel_id: ChannelId,
    /// Ledger-assigned sequence number
    pub sequence_number: u64,
    /// Ledger-assigned timestamp
    pub consensus_timestamp: ConsensusTimestamp,
}

/// Who may submit records to a channel
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitPolicy {
    /// Any account may submit
    Open,
    /// Only the holder of this key may submit
    Single(VerifyingKey),
    /// At least `threshold` of `keys` must have signed
    Threshold {
        /// Number of distinct keys required
        threshold: usize,
        /// Eligible keys
        keys: Vec<VerifyingKey>,
    },
}

impl SubmitPolicy {
    /// 1-of-2 policy shared by the two parties of a connection
    pub fn either_of(a: VerifyingKey, b: VerifyingKey) -> Self {
        SubmitPolicy::Threshold {
            threshold: 1,
            keys: vec![a, b],
        }
    }

    /// Check whether the given signatures over `body` satisfy the policy
    pub fn permits(&self, body: &[u8], signatures: &[(VerifyingKey, Signature)]) -> bool {
        let signed_by = |key: &VerifyingKey| {
            signatures
                .iter()
                .any(|(k, sig)| k == key && verify_signature(k, body, sig))
        };

        match self {
            SubmitPolicy::Open => true,
            SubmitPolicy::Single(key) => signed_by(key),
            SubmitPolicy::Threshold { threshold, keys } => {
                keys.iter().filter(|key| signed_by(key)).count() >= *threshold
            }
        }
    }
}

/// Consensus submit path
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Create a channel with the given memo and submit policy, paid and signed by `signer`
    async fn create_channel(
        &self,
        memo: &str,
        policy: SubmitPolicy,
        signer: &dyn LedgerSigner,
    ) -> LinkResult<ChannelId>;

    /// Append one record to a channel
    async fn submit_message(
        &self,
        channel_id: &ChannelId,
        payload: &[u8],
        signer: &dyn LedgerSigner,
    ) -> LinkResult<SubmitReceipt>;

    /// Replace the signer's account memo
    async fn update_account_memo(&self, memo: &str, signer: &dyn LedgerSigner) -> LinkResult<()>;
}

/// Eventually consistent read replica
#[async_trait]
pub trait MirrorNode: Send + Sync {
    /// Memo the channel was created with
    async fn channel_memo(&self, channel_id: &ChannelId) -> LinkResult<String>;

    /// Records of a channel in ascending sequence order, optionally only those after `after`
    async fn channel_messages(
        &self,
        channel_id: &ChannelId,
        after: Option<u64>,
    ) -> LinkResult<Vec<LedgerRecord>>;

    /// Live records of a channel; a record may be delivered more than once
    fn subscribe(&self, channel_id: &ChannelId) -> BoxStream<'static, LedgerRecord>;

    /// Account memo as currently visible on the replica
    async fn account_memo(&self, account_id: &AccountId) -> LinkResult<Option<String>>;

    /// Public key of an account
    async fn account_public_key(&self, account_id: &AccountId) -> LinkResult<VerifyingKey>;
}

/// Decode a record message to text
///
/// The replica serves base64. Some producers base64-encode their payload
/// before submitting, so if the once-decoded text still looks like base64
/// it is decoded again. Text that is not base64 at all is returned as-is.
pub fn decode_payload(message: &str) -> String {
    let trimmed = message.trim();
    let Some(once) = decode_base64_text(trimmed) else {
        return trimmed.to_string();
    };

    match decode_base64_text(once.trim()) {
        Some(twice) => twice,
        None => once,
    }
}

/// Encode bytes the way the replica serves them
pub fn encode_payload(payload: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(payload)
}

/// True if the text is plausibly standard base64 (alphabet, padding, length)
pub fn looks_like_base64(text: &str) -> bool {
    !text.is_empty()
        && text.len() % 4 == 0
        && text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

fn decode_base64_text(text: &str) -> Option<String> {
    if !looks_like_base64(text) {
        return None;
    }
    let bytes = base64::engine::general_purpose::STANDARD.decode(text).ok()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{submission_body, AccountSigner};

    #[test]
    fn test_decode_payload_single_encoding() {
        let message = encode_payload(br#"{"p":"hcs-10","op":"message"}"#);
        assert_eq!(decode_payload(&message), r#"{"p":"hcs-10","op":"message"}"#);
    }

    #[test]
    fn test_decode_payload_double_encoding() {
        let inner = encode_payload(br#"{"from":"a","to":"b","sentAt":"now"}"#);
        let message = encode_payload(inner.as_bytes());
        assert_eq!(decode_payload(&message), r#"{"from":"a","to":"b","sentAt":"now"}"#);
    }

    #[test]
    fn test_decode_payload_plain_text_passthrough() {
        assert_eq!(decode_payload(r#"{"offset":0}"#), r#"{"offset":0}"#);
    }

    #[test]
    fn test_looks_like_base64() {
        assert!(looks_like_base64("aGVsbG8="));
        assert!(!looks_like_base64("aGVsbG8"));
        assert!(!looks_like_base64("{\"a\":1}"));
        assert!(!looks_like_base64(""));
    }

    #[test]
    fn test_threshold_policy() {
        let alice = AccountSigner::generate("0.0.1");
        let bob = AccountSigner::generate("0.0.2");
        let mallory = AccountSigner::generate("0.0.3");
        let policy = SubmitPolicy::either_of(alice.public_key(), bob.public_key());

        let body = submission_body(&ChannelId::new("0.0.9"), b"data");
        assert!(policy.permits(&body, &[(bob.public_key(), bob.sign(&body))]));
        assert!(!policy.permits(&body, &[(mallory.public_key(), mallory.sign(&body))]));
        // Right key, signature over a different body
        assert!(!policy.permits(&body, &[(alice.public_key(), alice.sign(b"other"))]));
    }

    #[test]
    fn test_single_and_open_policy() {
        let owner = AccountSigner::generate("0.0.1");
        let other = AccountSigner::generate("0.0.2");
        let body = b"x";

        let single = SubmitPolicy::Single(owner.public_key());
        assert!(single.permits(body, &[(owner.public_key(), owner.sign(body))]));
        assert!(!single.permits(body, &[(other.public_key(), other.sign(body))]));
        assert!(SubmitPolicy::Open.permits(body, &[]));
    }
}
