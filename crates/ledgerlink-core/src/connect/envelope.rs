//! Wire shapes of records on inbound, outbound, and connection channels
//!
//! Two record families share these channels:
//!
//! ```text
//! direct message   {"from":..,"to":..,"sentAt":..,"content":..}
//! protocol record  {"p":"hcs-10","op":"connection_request"|"connection_created"|
//!                                    "message"|"close_connection", ...}
//! ```
//!
//! A record is tried as a direct message first, then as a protocol
//! envelope. Anything else is dropped without error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::PROTOCOL_TAG;
use crate::ledger::LedgerRecord;
use crate::types::{AccountId, ChannelId};

/// Protocol envelope (`p` + operation + optional memo `m`)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HcsEnvelope {
    /// Protocol tag, always `hcs-10`
    pub p: String,
    /// The operation, discriminated by `op`
    #[serde(flatten)]
    pub operation: HcsOperation,
    /// Free-form memo
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<String>,
}

impl HcsEnvelope {
    /// Wrap an operation with the protocol tag
    pub fn new(operation: HcsOperation) -> Self {
        Self {
            p: PROTOCOL_TAG.to_string(),
            operation,
            m: None,
        }
    }

    /// Attach a memo
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.m = Some(memo.into());
        self
    }

    /// JSON bytes to submit
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Protocol operations
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HcsOperation {
    /// Ask the owner of an inbound channel for a connection
    ConnectionRequest {
        /// Requester's `<inbound>@<account>`
        operator_id: String,
        /// Requester's outbound channel
        requestor_outbound_channel_id: ChannelId,
        /// Requester's account
        requestor_account_id: AccountId,
        /// Requester's alias
        #[serde(default, skip_serializing_if = "Option::is_none")]
        requestor_alias: Option<String>,
        /// Requester's display name
        #[serde(default, skip_serializing_if = "Option::is_none")]
        requestor_display_name: Option<String>,
        /// Note for the recipient (at most 280 characters)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        /// Set on the requester's own outbound copy: the request's sequence
        /// number on the target inbound channel
        #[serde(default, skip_serializing_if = "Option::is_none")]
        connection_request_id: Option<u64>,
        /// Set on the outbound copy: the inbound channel the request went to
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_inbound_channel_id: Option<ChannelId>,
    },
    /// Confirm a request and name the new shared channel
    ConnectionCreated {
        /// Shared channel for the connection
        connection_channel_id: ChannelId,
        /// Account of the requester
        connected_account_id: AccountId,
        /// Request id being confirmed
        connection_id: u64,
        /// Acceptor's `<inbound>@<account>`
        operator_id: String,
    },
    /// Payload on a shared channel
    Message {
        /// Sender's `<inbound>@<account>`
        operator_id: String,
        /// Message body
        data: String,
    },
    /// Either party ends the connection
    CloseConnection {
        /// Sender's `<inbound>@<account>`
        operator_id: String,
        /// Why the connection was closed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
}

/// Plain message outside the handshake protocol
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    /// Sender (account id or operator string)
    pub from: String,
    /// Recipient
    pub to: String,
    /// When the sender wrote it (RFC 3339)
    pub sent_at: String,
    /// Message text
    #[serde(default, alias = "text", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl DirectMessage {
    /// Message stamped with the current time
    pub fn new(from: impl Into<String>, to: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            sent_at: chrono::Utc::now().to_rfc3339(),
            content: Some(content.into()),
        }
    }
}

/// A decoded record
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    /// Plain direct message
    Direct(DirectMessage),
    /// Protocol envelope
    Protocol(HcsEnvelope),
}

/// Decode record text
pub fn decode_inbound(text: &str) -> Option<InboundMessage> {
    let value: Value = serde_json::from_str(text).ok()?;
    let object = value.as_object()?;

    let is_direct = ["from", "to", "sentAt"]
        .iter()
        .all(|key| object.get(*key).map(Value::is_string).unwrap_or(false));
    if is_direct {
        if let Ok(message) = serde_json::from_value::<DirectMessage>(value.clone()) {
            return Some(InboundMessage::Direct(message));
        }
    }

    if object.get("p").and_then(Value::as_str) != Some(PROTOCOL_TAG) {
        return None;
    }
    serde_json::from_value::<HcsEnvelope>(value)
        .ok()
        .map(InboundMessage::Protocol)
}

/// Decode a ledger record, unwrapping any base64 layers first
pub fn decode_record(record: &LedgerRecord) -> Option<InboundMessage> {
    decode_inbound(&record.payload_text())
}
