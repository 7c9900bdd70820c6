//! Merged, deduplicated timeline of decoded channel records
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Inbox                                                          │
//! │  ├── entries: (consensus time, channel, seq) -> InboxEntry      │
//! │  │   └── bounded, oldest evicted first                          │
//! │  ├── seen: (channel, seq) already held                          │
//! │  └── evicted_through: channel -> highest evicted seq            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! History fetches and live subscriptions feed the same inbox. A record is
//! held at most once per `(channel, sequence)`, so a subscription that
//! re-delivers what a fetch already returned adds nothing. Evicted records
//! stay out: anything at or below a channel's eviction mark is ignored.

use std::collections::{BTreeMap, HashMap, HashSet};

use futures::stream::{BoxStream, StreamExt};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::envelope::{decode_record, DirectMessage, HcsOperation, InboundMessage};
use super::operator::{parse_operator_id, OperatorId};
use crate::constants::DEFAULT_INBOX_CAPACITY;
use crate::ledger::LedgerRecord;
use crate::types::{AccountId, ChannelId, ConsensusTimestamp};

/// A connection request as seen on an inbound or outbound channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequestEvent {
    /// Channel the request was read from
    pub channel_id: ChannelId,
    /// Sequence number of this record
    pub sequence_number: u64,
    /// Request id: the sequence number on the target's inbound channel
    pub request_id: u64,
    /// Requester, if its operator string was well formed
    pub operator: Option<OperatorId>,
    /// Requester's account
    pub requestor_account_id: AccountId,
    /// Requester's outbound channel
    pub requestor_outbound_channel_id: ChannelId,
    /// Requester's alias
    pub alias: Option<String>,
    /// Requester's display name
    pub display_name: Option<String>,
    /// Note attached to the request
    pub note: Option<String>,
    /// Inbound channel the request was sent to, when read from an outbound copy
    pub target_inbound_channel_id: Option<ChannelId>,
}

/// A confirmation naming a new shared channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionCreatedEvent {
    /// Channel the confirmation was read from
    pub channel_id: ChannelId,
    /// Sequence number of this record
    pub sequence_number: u64,
    /// Shared channel for the connection
    pub connection_channel_id: ChannelId,
    /// Account of the requester
    pub connected_account_id: AccountId,
    /// Request id being confirmed
    pub connection_id: u64,
    /// Acceptor, if its operator string was well formed
    pub operator: Option<OperatorId>,
}

/// A message on a shared channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Shared channel
    pub channel_id: ChannelId,
    /// Sequence number of this record
    pub sequence_number: u64,
    /// Sender, if its operator string was well formed
    pub operator: Option<OperatorId>,
    /// Message body
    pub data: String,
}

/// An established connection, from one party's point of view
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    /// Shared channel
    pub connection_channel_id: ChannelId,
    /// Request the connection answered
    pub request_id: u64,
    /// The other party's account
    pub peer_account_id: AccountId,
    /// The other party's operator identity, when known
    pub peer_operator: Option<OperatorId>,
    /// Our own operator identity
    pub local_operator: OperatorId,
}

/// What a timeline entry holds
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboxEvent {
    /// `connection_request`
    ConnectionRequest(ConnectionRequestEvent),
    /// `connection_created`
    ConnectionCreated(ConnectionCreatedEvent),
    /// `message`
    Message(ChannelMessage),
    /// `close_connection`
    ConnectionClosed {
        /// Who closed it
        operator: Option<OperatorId>,
        /// Why
        reason: Option<String>,
    },
    /// Plain direct message
    Direct(DirectMessage),
}

/// One decoded record in the timeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboxEntry {
    /// Channel the record is on
    pub channel_id: ChannelId,
    /// Position within the channel
    pub sequence_number: u64,
    /// Consensus time of the record
    pub consensus_timestamp: ConsensusTimestamp,
    /// Account that submitted it
    pub payer_account_id: AccountId,
    /// Decoded content
    pub event: InboxEvent,
}

impl InboxEntry {
    /// Decode a ledger record, or `None` if it is not a recognized message
    pub fn from_record(record: &LedgerRecord) -> Option<Self> {
        let event = match decode_record(record)? {
            InboundMessage::Direct(message) => InboxEvent::Direct(message),
            InboundMessage::Protocol(envelope) => match envelope.operation {
                HcsOperation::ConnectionRequest {
                    operator_id,
                    requestor_outbound_channel_id,
                    requestor_account_id,
                    requestor_alias,
                    requestor_display_name,
                    note,
                    connection_request_id,
                    target_inbound_channel_id,
                } => InboxEvent::ConnectionRequest(ConnectionRequestEvent {
                    channel_id: record.channel_id.clone(),
                    sequence_number: record.sequence_number,
                    request_id: connection_request_id.unwrap_or(record.sequence_number),
                    operator: parse_operator_id(Some(&operator_id)),
                    requestor_account_id,
                    requestor_outbound_channel_id,
                    alias: requestor_alias,
                    display_name: requestor_display_name,
                    note,
                    target_inbound_channel_id,
                }),
                HcsOperation::ConnectionCreated {
                    connection_channel_id,
                    connected_account_id,
                    connection_id,
                    operator_id,
                } => InboxEvent::ConnectionCreated(ConnectionCreatedEvent {
                    channel_id: record.channel_id.clone(),
                    sequence_number: record.sequence_number,
                    connection_channel_id,
                    connected_account_id,
                    connection_id,
                    operator: parse_operator_id(Some(&operator_id)),
                }),
                HcsOperation::Message { operator_id, data } => {
                    InboxEvent::Message(ChannelMessage {
                        channel_id: record.channel_id.clone(),
                        sequence_number: record.sequence_number,
                        operator: parse_operator_id(Some(&operator_id)),
                        data,
                    })
                }
                HcsOperation::CloseConnection {
                    operator_id,
                    reason,
                } => InboxEvent::ConnectionClosed {
                    operator: parse_operator_id(Some(&operator_id)),
                    reason,
                },
            },
        };

        Some(Self {
            channel_id: record.channel_id.clone(),
            sequence_number: record.sequence_number,
            consensus_timestamp: record.consensus_timestamp,
            payer_account_id: record.payer_account_id.clone(),
            event,
        })
    }

    fn dedup_key(&self) -> (ChannelId, u64) {
        (self.channel_id.clone(), self.sequence_number)
    }
}

type TimelineKey = (ConsensusTimestamp, ChannelId, u64);

struct InboxInner {
    capacity: usize,
    entries: BTreeMap<TimelineKey, InboxEntry>,
    seen: HashSet<(ChannelId, u64)>,
    evicted_through: HashMap<ChannelId, u64>,
}

/// Bounded, deduplicated timeline shared by history fetches and live subscriptions
pub struct Inbox {
    inner: RwLock<InboxInner>,
}

impl Default for Inbox {
    fn default() -> Self {
        Self::new(DEFAULT_INBOX_CAPACITY)
    }
}

impl Inbox {
    /// Inbox holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(InboxInner {
                capacity: capacity.max(1),
                entries: BTreeMap::new(),
                seen: HashSet::new(),
                evicted_through: HashMap::new(),
            }),
        }
    }

    /// Add a record; returns the entry if it was new and recognized
    pub fn ingest(&self, record: &LedgerRecord) -> Option<InboxEntry> {
        let mut inner = self.inner.write();
        let key = record.key();

        if inner.seen.contains(&key) {
            return None;
        }
        if let Some(&mark) = inner.evicted_through.get(&record.channel_id) {
            if record.sequence_number <= mark {
                return None;
            }
        }

        let entry = InboxEntry::from_record(record)?;
        inner.seen.insert(key);
        inner.entries.insert(
            (
                entry.consensus_timestamp,
                entry.channel_id.clone(),
                entry.sequence_number,
            ),
            entry.clone(),
        );

        while inner.entries.len() > inner.capacity {
            let Some((_, evicted)) = inner.entries.pop_first() else {
                break;
            };
            let key = evicted.dedup_key();
            inner.seen.remove(&key);
            let mark = inner.evicted_through.entry(key.0).or_insert(0);
            *mark = (*mark).max(key.1);
        }

        Some(entry)
    }

    /// Add many records; returns how many were new
    pub fn ingest_all<'a>(&self, records: impl IntoIterator<Item = &'a LedgerRecord>) -> usize {
        records
            .into_iter()
            .filter_map(|record| self.ingest(record))
            .count()
    }

    /// Pull from a live stream until a record not yet held arrives
    ///
    /// Returns `None` when the stream ends.
    pub async fn next_live(
        &self,
        stream: &mut BoxStream<'static, LedgerRecord>,
    ) -> Option<InboxEntry> {
        while let Some(record) = stream.next().await {
            if let Some(entry) = self.ingest(&record) {
                return Some(entry);
            }
        }
        None
    }

    /// Number of entries held
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// True if nothing is held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry in ledger order
    pub fn entries(&self) -> Vec<InboxEntry> {
        self.inner.read().entries.values().cloned().collect()
    }

    /// Entries of one channel in sequence order
    pub fn channel_entries(&self, channel_id: &ChannelId) -> Vec<InboxEntry> {
        self.inner
            .read()
            .entries
            .values()
            .filter(|entry| &entry.channel_id == channel_id)
            .cloned()
            .collect()
    }

    /// Connection requests in ledger order
    pub fn connection_requests(&self) -> Vec<ConnectionRequestEvent> {
        self.collect(|event| match event {
            InboxEvent::ConnectionRequest(request) => Some(request.clone()),
            _ => None,
        })
    }

    /// Connection confirmations in ledger order
    pub fn confirmations(&self) -> Vec<ConnectionCreatedEvent> {
        self.collect(|event| match event {
            InboxEvent::ConnectionCreated(created) => Some(created.clone()),
            _ => None,
        })
    }

    /// Messages on one shared channel in sequence order
    pub fn messages(&self, channel_id: &ChannelId) -> Vec<ChannelMessage> {
        self.collect(|event| match event {
            InboxEvent::Message(message) if &message.channel_id == channel_id => {
                Some(message.clone())
            }
            _ => None,
        })
    }

    /// True if a close was recorded on the shared channel
    pub fn is_closed(&self, connection_channel_id: &ChannelId) -> bool {
        self.inner.read().entries.values().any(|entry| {
            &entry.channel_id == connection_channel_id
                && matches!(entry.event, InboxEvent::ConnectionClosed { .. })
        })
    }

    /// Find the confirmation of a request this actor sent
    ///
    /// A request is identified by the inbound channel it was sent to and the
    /// sequence number it received there. The confirmation names the same
    /// request id, and its operator is the owner of that inbound channel.
    pub fn resolve_connection(
        &self,
        local: &OperatorId,
        target_inbound: &ChannelId,
        request_id: u64,
    ) -> Option<ConnectionRecord> {
        self.confirmations()
            .into_iter()
            .find(|created| {
                created.connection_id == request_id
                    && created
                        .operator
                        .as_ref()
                        .map(|operator| &operator.channel_id == target_inbound)
                        .unwrap_or(false)
            })
            .map(|created| ConnectionRecord {
                connection_channel_id: created.connection_channel_id,
                request_id,
                peer_account_id: created
                    .operator
                    .as_ref()
                    .map(|operator| operator.account_id.clone())
                    .unwrap_or(created.connected_account_id),
                peer_operator: created.operator,
                local_operator: local.clone(),
            })
    }

    fn collect<T>(&self, pick: impl Fn(&InboxEvent) -> Option<T>) -> Vec<T> {
        self.inner
            .read()
            .entries
            .values()
            .filter_map(|entry| pick(&entry.event))
            .collect()
    }
}
