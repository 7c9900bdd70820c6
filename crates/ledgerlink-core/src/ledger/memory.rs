//! In-memory ledger
//!
//! Implements both [`LedgerClient`] and [`MirrorNode`] against process-local
//! state. It enforces the same rules a real network does (memo size limit,
//! submit policies, account keys) and can simulate a lagging read replica,
//! which makes it the backend for integration tests and local demos.
//!
//! ## State
//!
//! ```text
//! Inner
//! ├── channels: channel_id -> { memo, policy, records, live fan-out }
//! ├── accounts: account_id -> { key, consensus memo, mirrored memo }
//! ├── mirror_lag: when memo updates become visible on reads
//! └── faults: one-shot injected failures
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ed25519_dalek::VerifyingKey;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use super::{encode_payload, LedgerClient, LedgerRecord, MirrorNode, SubmitPolicy, SubmitReceipt};
use crate::constants::MAX_MEMO_BYTES;
use crate::error::{LinkError, LinkResult};
use crate::identity::{memo_update_body, submission_body, AccountSigner, LedgerSigner};
use crate::types::{AccountId, ChannelId, ConsensusTimestamp};

/// Buffer size of each channel's live fan-out
const LIVE_CHANNEL_SIZE: usize = 256;

/// First entity number handed out (accounts and channels share the counter)
const FIRST_ENTITY_NUM: u64 = 1001;

/// When account memo updates become visible to [`MirrorNode::account_memo`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorLag {
    /// Visible on the next read
    #[default]
    Immediate,
    /// The first `n` reads after an update still see the previous value
    AfterReads(u32),
    /// Updates never become visible
    Never,
}

struct ChannelState {
    memo: String,
    policy: SubmitPolicy,
    records: Vec<LedgerRecord>,
    live: broadcast::Sender<LedgerRecord>,
}

struct AccountState {
    key: VerifyingKey,
    consensus_memo: Option<String>,
    mirrored_memo: Option<String>,
    /// Remaining stale reads; `None` means the update never propagates
    reads_until_visible: Option<u32>,
}

#[derive(Default)]
struct Faults {
    fail_submit_to: HashSet<ChannelId>,
    fail_channel_creations: u32,
    fail_memo_updates: u32,
}

struct Inner {
    next_entity: u64,
    channels: HashMap<ChannelId, ChannelState>,
    accounts: HashMap<AccountId, AccountState>,
    mirror_lag: MirrorLag,
    last_timestamp: Option<ConsensusTimestamp>,
    account_memo_reads: u64,
    faults: Faults,
}

impl Inner {
    fn next_id(&mut self) -> String {
        let id = format!("0.0.{}", self.next_entity);
        self.next_entity += 1;
        id
    }

    /// Strictly increasing consensus time
    fn next_timestamp(&mut self) -> ConsensusTimestamp {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + chrono::Duration::nanoseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}

/// Process-local ledger implementing both the submit path and the read replica
pub struct InMemoryLedger {
    inner: RwLock<Inner>,
}

impl InMemoryLedger {
    /// Create an empty ledger whose replica reflects writes immediately
    pub fn new() -> Arc<Self> {
        Self::with_mirror_lag(MirrorLag::Immediate)
    }

    /// Create an empty ledger with the given replica lag for account memos
    pub fn with_mirror_lag(mirror_lag: MirrorLag) -> Arc<Self> {
        Arc::new(Self {
            inner: RwLock::new(Inner {
                next_entity: FIRST_ENTITY_NUM,
                channels: HashMap::new(),
                accounts: HashMap::new(),
                mirror_lag,
                last_timestamp: None,
                account_memo_reads: 0,
                faults: Faults::default(),
            }),
        })
    }

    /// Open a new account and return a signer for it
    pub fn create_account(&self) -> AccountSigner {
        let mut inner = self.inner.write();
        let account_id = AccountId::new(inner.next_id());
        let signer = AccountSigner::generate(account_id.clone());
        inner.accounts.insert(
            account_id,
            AccountState {
                key: signer.public_key(),
                consensus_memo: None,
                mirrored_memo: None,
                reads_until_visible: Some(0),
            },
        );
        signer
    }

    /// Register an externally created signer as an account
    pub fn register_account(&self, signer: &dyn LedgerSigner) {
        let mut inner = self.inner.write();
        inner
            .accounts
            .entry(signer.account_id().clone())
            .or_insert_with(|| AccountState {
                key: signer.public_key(),
                consensus_memo: None,
                mirrored_memo: None,
                reads_until_visible: Some(0),
            });
    }

    /// Change how account memo updates propagate to the replica
    pub fn set_mirror_lag(&self, mirror_lag: MirrorLag) {
        self.inner.write().mirror_lag = mirror_lag;
    }

    /// Number of channels created so far
    pub fn channel_count(&self) -> usize {
        self.inner.read().channels.len()
    }

    /// Number of records on a channel
    pub fn record_count(&self, channel_id: &ChannelId) -> usize {
        self.inner
            .read()
            .channels
            .get(channel_id)
            .map(|c| c.records.len())
            .unwrap_or(0)
    }

    /// Submit policy a channel was created with
    pub fn channel_policy(&self, channel_id: &ChannelId) -> Option<SubmitPolicy> {
        self.inner
            .read()
            .channels
            .get(channel_id)
            .map(|c| c.policy.clone())
    }

    /// Account memo as agreed by consensus (ignores replica lag)
    pub fn consensus_account_memo(&self, account_id: &AccountId) -> Option<String> {
        self.inner
            .read()
            .accounts
            .get(account_id)
            .and_then(|a| a.consensus_memo.clone())
    }

    /// Total number of replica account memo reads served
    pub fn account_memo_reads(&self) -> u64 {
        self.inner.read().account_memo_reads
    }

    /// Make the next submission to `channel_id` fail
    pub fn fail_next_submit_to(&self, channel_id: &ChannelId) {
        self.inner
            .write()
            .faults
            .fail_submit_to
            .insert(channel_id.clone());
    }

    /// Make the next `count` channel creations fail
    pub fn fail_next_channel_creations(&self, count: u32) {
        self.inner.write().faults.fail_channel_creations = count;
    }

    /// Make the next account memo update fail
    pub fn fail_next_memo_update(&self) {
        self.inner.write().faults.fail_memo_updates = 1;
    }

    /// Push already-committed records of a channel to live subscribers again
    ///
    /// Simulates a subscription that re-delivers history after reconnecting.
    pub fn redeliver(&self, channel_id: &ChannelId, from_sequence: u64) -> usize {
        let inner = self.inner.read();
        let Some(channel) = inner.channels.get(channel_id) else {
            return 0;
        };
        let mut delivered = 0;
        for record in channel
            .records
            .iter()
            .filter(|r| r.sequence_number >= from_sequence)
        {
            if channel.live.send(record.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn create_channel(
        &self,
        memo: &str,
        policy: SubmitPolicy,
        signer: &dyn LedgerSigner,
    ) -> LinkResult<ChannelId> {
        if memo.len() > MAX_MEMO_BYTES {
            return Err(LinkError::Ledger(format!(
                "Memo exceeds {} bytes ({} bytes)",
                MAX_MEMO_BYTES,
                memo.len()
            )));
        }

        let mut inner = self.inner.write();

        if inner.faults.fail_channel_creations > 0 {
            inner.faults.fail_channel_creations -= 1;
            return Err(LinkError::Ledger("Injected channel creation failure".to_string()));
        }

        if !inner.accounts.contains_key(signer.account_id()) {
            return Err(LinkError::AccountNotFound(signer.account_id().to_string()));
        }

        let channel_id = ChannelId::new(inner.next_id());
        let (live, _) = broadcast::channel(LIVE_CHANNEL_SIZE);
        inner.channels.insert(
            channel_id.clone(),
            ChannelState {
                memo: memo.to_string(),
                policy,
                records: Vec::new(),
                live,
            },
        );

        debug!(%channel_id, memo, payer = %signer.account_id(), "Created channel");
        Ok(channel_id)
    }

    async fn submit_message(
        &self,
        channel_id: &ChannelId,
        payload: &[u8],
        signer: &dyn LedgerSigner,
    ) -> LinkResult<SubmitReceipt> {
        let body = submission_body(channel_id, payload);
        let signature = signer.sign(&body);

        let mut inner = self.inner.write();

        if inner.faults.fail_submit_to.remove(channel_id) {
            return Err(LinkError::Ledger(format!(
                "Injected submit failure on {}",
                channel_id
            )));
        }

        let consensus_timestamp = inner.next_timestamp();
        let channel = inner
            .channels
            .get_mut(channel_id)
            .ok_or_else(|| LinkError::ChannelNotFound(channel_id.to_string()))?;

        if !channel
            .policy
            .permits(&body, &[(signer.public_key(), signature)])
        {
            return Err(LinkError::SignatureInvalid(format!(
                "{} may not submit to {}",
                signer.account_id(),
                channel_id
            )));
        }

        let record = LedgerRecord {
            channel_id: channel_id.clone(),
            sequence_number: channel.records.len() as u64 + 1,
            consensus_timestamp,
            payer_account_id: signer.account_id().clone(),
            message: encode_payload(payload),
        };
        channel.records.push(record.clone());
        // No live subscribers is not an error
        let _ = channel.live.send(record.clone());

        Ok(SubmitReceipt {
            channel_id: channel_id.clone(),
            sequence_number: record.sequence_number,
            consensus_timestamp,
        })
    }

    async fn update_account_memo(&self, memo: &str, signer: &dyn LedgerSigner) -> LinkResult<()> {
        if memo.len() > MAX_MEMO_BYTES {
            return Err(LinkError::Ledger(format!(
                "Account memo exceeds {} bytes",
                MAX_MEMO_BYTES
            )));
        }

        let body = memo_update_body(signer.account_id(), memo);
        let signature = signer.sign(&body);

        let mut inner = self.inner.write();

        if inner.faults.fail_memo_updates > 0 {
            inner.faults.fail_memo_updates -= 1;
            return Err(LinkError::Ledger("Injected memo update failure".to_string()));
        }

        let lag = inner.mirror_lag;
        let account = inner
            .accounts
            .get_mut(signer.account_id())
            .ok_or_else(|| LinkError::AccountNotFound(signer.account_id().to_string()))?;

        if !SubmitPolicy::Single(account.key).permits(&body, &[(signer.public_key(), signature)]) {
            return Err(LinkError::SignatureInvalid(format!(
                "Signature does not match key of {}",
                signer.account_id()
            )));
        }

        account.consensus_memo = Some(memo.to_string());
        account.reads_until_visible = match lag {
            MirrorLag::Immediate => Some(0),
            MirrorLag::AfterReads(n) => Some(n),
            MirrorLag::Never => None,
        };
        Ok(())
    }
}

#[async_trait]
impl MirrorNode for InMemoryLedger {
    async fn channel_memo(&self, channel_id: &ChannelId) -> LinkResult<String> {
        self.inner
            .read()
            .channels
            .get(channel_id)
            .map(|c| c.memo.clone())
            .ok_or_else(|| LinkError::ChannelNotFound(channel_id.to_string()))
    }

    async fn channel_messages(
        &self,
        channel_id: &ChannelId,
        after: Option<u64>,
    ) -> LinkResult<Vec<LedgerRecord>> {
        let inner = self.inner.read();
        let channel = inner
            .channels
            .get(channel_id)
            .ok_or_else(|| LinkError::ChannelNotFound(channel_id.to_string()))?;
        let after = after.unwrap_or(0);
        Ok(channel
            .records
            .iter()
            .filter(|r| r.sequence_number > after)
            .cloned()
            .collect())
    }

    fn subscribe(&self, channel_id: &ChannelId) -> BoxStream<'static, LedgerRecord> {
        let receiver = match self.inner.read().channels.get(channel_id) {
            Some(channel) => channel.live.subscribe(),
            None => return stream::empty().boxed(),
        };

        stream::unfold(receiver, |mut receiver| async move {
            loop {
                match receiver.recv().await {
                    Ok(record) => return Some((record, receiver)),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(missed = n, "Live subscription lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }

    async fn account_memo(&self, account_id: &AccountId) -> LinkResult<Option<String>> {
        let mut inner = self.inner.write();
        inner.account_memo_reads += 1;

        let account = inner
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| LinkError::AccountNotFound(account_id.to_string()))?;

        match account.reads_until_visible {
            Some(0) => account.mirrored_memo = account.consensus_memo.clone(),
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }
        Ok(account.mirrored_memo.clone())
    }

    async fn account_public_key(&self, account_id: &AccountId) -> LinkResult<VerifyingKey> {
        self.inner
            .read()
            .accounts
            .get(account_id)
            .map(|a| a.key)
            .ok_or_else(|| LinkError::AccountNotFound(account_id.to_string()))
    }
}
