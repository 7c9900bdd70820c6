//! Channel memos and idempotent channel provisioning
//!
//! Every channel an actor owns carries a memo describing its role:
//!
//! ```text
//! inbound     hcs-10:0:<ttl>:0:<accountId>
//! outbound    hcs-10:0:<ttl>:1
//! connection  hcs-10:1:<ttl>:2:<requesterInboundChannelId>:<requestId>
//! ```
//!
//! The provisioner never creates a channel for a purpose that already has a
//! known identifier.

use std::fmt;
use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use tracing::{debug, info};

use crate::constants::{DEFAULT_TTL_SECONDS, MAX_MEMO_BYTES, PROTOCOL_TAG};
use crate::error::{LinkError, LinkResult};
use crate::identity::LedgerSigner;
use crate::ledger::{LedgerClient, SubmitPolicy};
use crate::types::{AccountId, ChannelId};

/// What a channel is used for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelPurpose {
    /// Receives connection requests and confirmations
    Inbound,
    /// Records the owner's own handshake history
    Outbound,
    /// Holds a stored document
    Document,
    /// Shared between the two parties of a connection
    Connection,
}

impl ChannelPurpose {
    /// Lowercase name used in logs and errors
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelPurpose::Inbound => "inbound",
            ChannelPurpose::Outbound => "outbound",
            ChannelPurpose::Document => "document",
            ChannelPurpose::Connection => "connection",
        }
    }
}

impl fmt::Display for ChannelPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed protocol channel memo
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelMemo {
    /// `hcs-10:0:<ttl>:0:<accountId>`
    Inbound {
        /// Record time-to-live hint in seconds
        ttl_seconds: u32,
        /// Owner of the inbox
        account_id: AccountId,
    },
    /// `hcs-10:0:<ttl>:1`
    Outbound {
        /// Record time-to-live hint in seconds
        ttl_seconds: u32,
    },
    /// `hcs-10:1:<ttl>:2:<requesterInbound>:<requestId>`
    Connection {
        /// Record time-to-live hint in seconds
        ttl_seconds: u32,
        /// Inbound channel of the party that asked for the connection
        requester_inbound: ChannelId,
        /// Sequence number of the originating request
        request_id: u64,
    },
}

impl ChannelMemo {
    /// Purpose of the channel carrying this memo
    pub fn purpose(&self) -> ChannelPurpose {
        match self {
            ChannelMemo::Inbound { .. } => ChannelPurpose::Inbound,
            ChannelMemo::Outbound { .. } => ChannelPurpose::Outbound,
            ChannelMemo::Connection { .. } => ChannelPurpose::Connection,
        }
    }

    /// Render the memo, rejecting anything over the ledger memo limit
    pub fn encode(&self) -> LinkResult<String> {
        let memo = match self {
            ChannelMemo::Inbound {
                ttl_seconds,
                account_id,
            } => format!("{}:0:{}:0:{}", PROTOCOL_TAG, ttl_seconds, account_id),
            ChannelMemo::Outbound { ttl_seconds } => {
                format!("{}:0:{}:1", PROTOCOL_TAG, ttl_seconds)
            }
            ChannelMemo::Connection {
                ttl_seconds,
                requester_inbound,
                request_id,
            } => format!(
                "{}:1:{}:2:{}:{}",
                PROTOCOL_TAG, ttl_seconds, requester_inbound, request_id
            ),
        };

        if memo.len() > MAX_MEMO_BYTES || !memo.is_ascii() {
            return Err(LinkError::InvalidMemo(format!(
                "Channel memo must be ASCII and at most {} bytes: {:?}",
                MAX_MEMO_BYTES, memo
            )));
        }
        Ok(memo)
    }

    /// Parse a protocol channel memo
    pub fn parse(memo: &str) -> LinkResult<Self> {
        let invalid = || LinkError::InvalidMemo(format!("Unrecognized channel memo: {:?}", memo));
        let fields: Vec<&str> = memo.split(':').collect();

        if fields.first() != Some(&PROTOCOL_TAG) {
            return Err(invalid());
        }
        let ttl_seconds: u32 = fields
            .get(2)
            .and_then(|ttl| ttl.parse().ok())
            .ok_or_else(invalid)?;

        match fields.as_slice() {
            [_, "0", _, "0", account] if !account.is_empty() => Ok(ChannelMemo::Inbound {
                ttl_seconds,
                account_id: AccountId::new(*account),
            }),
            [_, "0", _, "1"] => Ok(ChannelMemo::Outbound { ttl_seconds }),
            [_, "1", _, "2", inbound, request_id] if !inbound.is_empty() => {
                Ok(ChannelMemo::Connection {
                    ttl_seconds,
                    requester_inbound: ChannelId::new(*inbound),
                    request_id: request_id.parse().map_err(|_| invalid())?,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// A channel identifier together with the memo it was created with
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelReference {
    /// Ledger identifier
    pub channel_id: ChannelId,
    /// Memo describing the channel's role
    pub memo: ChannelMemo,
}

/// Result of resolving a channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Provisioned {
    /// A known channel was reused; nothing was written
    Reused(ChannelId),
    /// A new channel was created
    Created(ChannelReference),
}

impl Provisioned {
    /// Identifier of the resolved channel
    pub fn channel_id(&self) -> &ChannelId {
        match self {
            Provisioned::Reused(channel_id) => channel_id,
            Provisioned::Created(reference) => &reference.channel_id,
        }
    }

    /// True if a channel was created
    pub fn was_created(&self) -> bool {
        matches!(self, Provisioned::Created(_))
    }
}

/// Resolves or creates the channels an actor needs
#[derive(Clone)]
pub struct ChannelProvisioner {
    ledger: Arc<dyn LedgerClient>,
    ttl_seconds: u32,
}

impl ChannelProvisioner {
    /// Provisioner using the default memo TTL
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self::with_ttl(ledger, DEFAULT_TTL_SECONDS)
    }

    /// Provisioner writing the given TTL into memos
    pub fn with_ttl(ledger: Arc<dyn LedgerClient>, ttl_seconds: u32) -> Self {
        Self {
            ledger,
            ttl_seconds,
        }
    }

    /// Reuse `existing` or create an inbound channel anyone may write to
    pub async fn ensure_inbound(
        &self,
        existing: Option<&ChannelId>,
        signer: &dyn LedgerSigner,
    ) -> LinkResult<Provisioned> {
        let memo = ChannelMemo::Inbound {
            ttl_seconds: self.ttl_seconds,
            account_id: signer.account_id().clone(),
        };
        self.ensure(existing, memo, SubmitPolicy::Open, signer).await
    }

    /// Reuse `existing` or create an outbound channel only the owner may write to
    pub async fn ensure_outbound(
        &self,
        existing: Option<&ChannelId>,
        signer: &dyn LedgerSigner,
    ) -> LinkResult<Provisioned> {
        let memo = ChannelMemo::Outbound {
            ttl_seconds: self.ttl_seconds,
        };
        let policy = SubmitPolicy::Single(signer.public_key());
        self.ensure(existing, memo, policy, signer).await
    }

    /// Reuse `existing` or create the shared channel for an accepted request
    ///
    /// Either party may write to it (1-of-2 threshold over both keys).
    /// Passing the channel from an earlier failed acceptance keeps a retry
    /// from leaving a second, unannounced channel behind.
    pub async fn ensure_connection_channel(
        &self,
        existing: Option<&ChannelId>,
        requester_inbound: &ChannelId,
        request_id: u64,
        peer_key: VerifyingKey,
        signer: &dyn LedgerSigner,
    ) -> LinkResult<Provisioned> {
        let memo = ChannelMemo::Connection {
            ttl_seconds: self.ttl_seconds,
            requester_inbound: requester_inbound.clone(),
            request_id,
        };
        let policy = SubmitPolicy::either_of(signer.public_key(), peer_key);
        self.ensure(existing, memo, policy, signer).await
    }

    async fn ensure(
        &self,
        existing: Option<&ChannelId>,
        memo: ChannelMemo,
        policy: SubmitPolicy,
        signer: &dyn LedgerSigner,
    ) -> LinkResult<Provisioned> {
        if let Some(channel_id) = existing.filter(|id| !id.is_blank()) {
            debug!(purpose = %memo.purpose(), %channel_id, "Reusing channel");
            return Ok(Provisioned::Reused(channel_id.clone()));
        }
        Ok(Provisioned::Created(self.create(memo, policy, signer).await?))
    }

    async fn create(
        &self,
        memo: ChannelMemo,
        policy: SubmitPolicy,
        signer: &dyn LedgerSigner,
    ) -> LinkResult<ChannelReference> {
        let purpose = memo.purpose();
        let text = memo
            .encode()
            .map_err(|e| LinkError::channel_resolution(purpose.as_str(), e))?;

        let channel_id = self
            .ledger
            .create_channel(&text, policy, signer)
            .await
            .map_err(|e| LinkError::channel_resolution(purpose.as_str(), e))?;

        info!(%purpose, %channel_id, memo = %text, "Created channel");
        Ok(ChannelReference { channel_id, memo })
    }
}
