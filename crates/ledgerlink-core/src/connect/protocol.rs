//! Connection handshake and steady-state messaging
//!
//! ## Message flow
//!
//! ```text
//! Requester (B)                                  Acceptor (A)
//!   |                                               |
//!   |-- connection_request ----------------------->|  A.inbound, seq N
//!   |   (operator B.in@B, B.outbound, note)         |
//!   |-- copy {connection_request_id: N} -> B.outbound
//!   |                                               |
//!   |                      create shared channel C  |  memo ...:2:B.in:N
//!   |                      (1-of-2: A or B)         |
//!   |<-- connection_created ------------------------|  B.inbound
//!   |    (C, connection_id N, operator A.in@A)      |
//!   |                  copy -> A.outbound ----------|
//!   |                                               |
//!   |<========== message {operator_id, data} ======>|  C
//! ```
//!
//! The request id is the sequence number the ledger gave the request on the
//! acceptor's inbound channel, so `(channel, sequence)` identifies a request
//! on both sides without any client-generated id.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::envelope::{DirectMessage, HcsEnvelope, HcsOperation};
use super::inbox::{ConnectionRecord, ConnectionRequestEvent, Inbox};
use super::operator::{parse_operator_id, OperatorId};
use crate::channels::ChannelProvisioner;
use crate::constants::{truncate_chars, MAX_NOTE_CHARS};
use crate::error::{LinkError, LinkResult};
use crate::identity::LedgerSigner;
use crate::ledger::{LedgerClient, LedgerRecord, MirrorNode, SubmitReceipt};
use crate::types::{AccountId, ChannelId};

/// The local side of a connection: an account and its two channels
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalActor {
    /// Account acting
    pub account_id: AccountId,
    /// Where peers send requests and confirmations
    pub inbound_channel_id: ChannelId,
    /// Where this actor records its own handshake history
    pub outbound_channel_id: ChannelId,
}

impl LocalActor {
    /// Actor with the given account and channels
    pub fn new(
        account_id: AccountId,
        inbound_channel_id: ChannelId,
        outbound_channel_id: ChannelId,
    ) -> Self {
        Self {
            account_id,
            inbound_channel_id,
            outbound_channel_id,
        }
    }

    /// `<inbound>@<account>`
    pub fn operator(&self) -> OperatorId {
        OperatorId::new(self.inbound_channel_id.clone(), self.account_id.clone())
    }
}

/// Optional details sent with a connection request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RequestDetails {
    /// Requester's alias
    pub alias: Option<String>,
    /// Requester's display name
    pub display_name: Option<String>,
    /// Note for the recipient (truncated to 280 characters)
    pub note: Option<String>,
}

/// A request that reached the target's inbound channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentRequest {
    /// Inbound channel the request was sent to
    pub target_inbound_channel_id: ChannelId,
    /// Sequence number on that channel; the request id
    pub request_id: u64,
    /// Sequence number of the copy on the sender's outbound channel
    pub outbound_sequence_number: u64,
}

/// An acceptance that stopped before both confirmations were written
///
/// `connection_channel_id` is set once the shared channel exists. Passing it
/// back to [`ConnectionProtocol::create_connection`] finishes the handshake
/// on that channel instead of creating another.
#[derive(Error, Debug)]
#[error("Connection setup failed: {error}")]
pub struct ConnectionFailure {
    /// Underlying error
    #[source]
    pub error: LinkError,
    /// Shared channel created before the failure, if any
    pub connection_channel_id: Option<ChannelId>,
}

impl ConnectionFailure {
    fn new(error: LinkError, connection_channel_id: Option<ChannelId>) -> Self {
        Self {
            error,
            connection_channel_id,
        }
    }
}

impl From<LinkError> for ConnectionFailure {
    fn from(error: LinkError) -> Self {
        Self::new(error, None)
    }
}

/// Runs the handshake and message exchange over a ledger
#[derive(Clone)]
pub struct ConnectionProtocol {
    ledger: Arc<dyn LedgerClient>,
    mirror: Arc<dyn MirrorNode>,
    provisioner: ChannelProvisioner,
}

impl ConnectionProtocol {
    /// Protocol using the default memo TTL for connection channels
    pub fn new(ledger: Arc<dyn LedgerClient>, mirror: Arc<dyn MirrorNode>) -> Self {
        Self {
            provisioner: ChannelProvisioner::new(ledger.clone()),
            ledger,
            mirror,
        }
    }

    /// Protocol writing `ttl_seconds` into connection channel memos
    pub fn with_ttl(
        ledger: Arc<dyn LedgerClient>,
        mirror: Arc<dyn MirrorNode>,
        ttl_seconds: u32,
    ) -> Self {
        Self {
            provisioner: ChannelProvisioner::with_ttl(ledger.clone(), ttl_seconds),
            ledger,
            mirror,
        }
    }

    /// Ask the owner of `target_inbound` for a connection
    pub async fn send_connection_request(
        &self,
        local: &LocalActor,
        signer: &dyn LedgerSigner,
        target_inbound: &ChannelId,
        details: RequestDetails,
    ) -> LinkResult<SentRequest> {
        check_signer(local, signer)?;

        let note = details
            .note
            .as_deref()
            .map(|note| truncate_chars(note, MAX_NOTE_CHARS).to_string());
        let request = |connection_request_id: Option<u64>,
                       target_inbound_channel_id: Option<ChannelId>| {
            HcsEnvelope::new(HcsOperation::ConnectionRequest {
                operator_id: local.operator().to_string(),
                requestor_outbound_channel_id: local.outbound_channel_id.clone(),
                requestor_account_id: local.account_id.clone(),
                requestor_alias: details.alias.clone(),
                requestor_display_name: details.display_name.clone(),
                note: note.clone(),
                connection_request_id,
                target_inbound_channel_id,
            })
        };

        let receipt = self
            .ledger
            .submit_message(target_inbound, &request(None, None).to_bytes()?, signer)
            .await?;
        let request_id = receipt.sequence_number;

        let copy = request(Some(request_id), Some(target_inbound.clone()));
        let outbound = self
            .ledger
            .submit_message(&local.outbound_channel_id, &copy.to_bytes()?, signer)
            .await?;

        info!(target = %target_inbound, request_id, "Sent connection request");

        Ok(SentRequest {
            target_inbound_channel_id: target_inbound.clone(),
            request_id,
            outbound_sequence_number: outbound.sequence_number,
        })
    }

    /// Accept a request: create the shared channel and confirm it to the requester
    ///
    /// Fails with [`LinkError::HandshakeOperatorMissing`] when the request has
    /// no usable operator identity, since the confirmation could not be
    /// addressed. `existing` is the channel reported by an earlier
    /// [`ConnectionFailure`] for the same request; it is reused as is.
    pub async fn create_connection(
        &self,
        local: &LocalActor,
        signer: &dyn LedgerSigner,
        request: &ConnectionRequestEvent,
        existing: Option<&ChannelId>,
    ) -> Result<ConnectionRecord, ConnectionFailure> {
        check_signer(local, signer)?;

        let requester = request.operator.clone().ok_or_else(|| {
            LinkError::HandshakeOperatorMissing(format!(
                "connection request {} on {}",
                request.request_id, request.channel_id
            ))
        })?;

        let peer_key = self
            .mirror
            .account_public_key(&requester.account_id)
            .await?;
        let channel_id = self
            .provisioner
            .ensure_connection_channel(
                existing,
                &requester.channel_id,
                request.request_id,
                peer_key,
                signer,
            )
            .await?
            .channel_id()
            .clone();

        let confirmation = HcsEnvelope::new(HcsOperation::ConnectionCreated {
            connection_channel_id: channel_id.clone(),
            connected_account_id: requester.account_id.clone(),
            connection_id: request.request_id,
            operator_id: local.operator().to_string(),
        });

        let confirmed = async {
            let payload = confirmation.to_bytes()?;
            self.ledger
                .submit_message(&requester.channel_id, &payload, signer)
                .await?;
            self.ledger
                .submit_message(&local.outbound_channel_id, &payload, signer)
                .await?;
            Ok::<_, LinkError>(())
        }
        .await;
        if let Err(error) = confirmed {
            warn!(
                connection = %channel_id,
                request_id = request.request_id,
                %error,
                "Connection confirmation failed"
            );
            return Err(ConnectionFailure::new(error, Some(channel_id)));
        }

        info!(
            connection = %channel_id,
            request_id = request.request_id,
            peer = %requester,
            "Created connection"
        );

        Ok(ConnectionRecord {
            connection_channel_id: channel_id,
            request_id: request.request_id,
            peer_account_id: requester.account_id.clone(),
            peer_operator: Some(requester),
            local_operator: local.operator(),
        })
    }

    /// Submit a message to a shared channel as `operator_id`
    pub async fn send_message(
        &self,
        signer: &dyn LedgerSigner,
        connection_channel_id: &ChannelId,
        operator_id: Option<&str>,
        data: impl Into<String>,
    ) -> LinkResult<SubmitReceipt> {
        let operator = require_operator(operator_id)?;
        let envelope = HcsEnvelope::new(HcsOperation::Message {
            operator_id: operator.to_string(),
            data: data.into(),
        });

        let receipt = self
            .ledger
            .submit_message(connection_channel_id, &envelope.to_bytes()?, signer)
            .await?;
        debug!(channel = %connection_channel_id, sequence = receipt.sequence_number, "Sent message");
        Ok(receipt)
    }

    /// Submit a message on an established connection
    pub async fn send(
        &self,
        signer: &dyn LedgerSigner,
        connection: &ConnectionRecord,
        data: impl Into<String>,
    ) -> LinkResult<SubmitReceipt> {
        let operator = connection.local_operator.to_string();
        self.send_message(signer, &connection.connection_channel_id, Some(&operator), data)
            .await
    }

    /// Record that a connection is closed
    pub async fn close_connection(
        &self,
        signer: &dyn LedgerSigner,
        connection: &ConnectionRecord,
        reason: Option<&str>,
    ) -> LinkResult<SubmitReceipt> {
        let envelope = HcsEnvelope::new(HcsOperation::CloseConnection {
            operator_id: connection.local_operator.to_string(),
            reason: reason.map(str::to_string),
        });
        let receipt = self
            .ledger
            .submit_message(&connection.connection_channel_id, &envelope.to_bytes()?, signer)
            .await?;
        info!(connection = %connection.connection_channel_id, "Closed connection");
        Ok(receipt)
    }

    /// Send a plain direct message to an inbound channel
    pub async fn send_direct(
        &self,
        signer: &dyn LedgerSigner,
        target_inbound: &ChannelId,
        to: impl Into<String>,
        content: impl Into<String>,
    ) -> LinkResult<SubmitReceipt> {
        let message = DirectMessage::new(signer.account_id().to_string(), to, content);
        self.ledger
            .submit_message(target_inbound, &serde_json::to_vec(&message)?, signer)
            .await
    }

    /// Fetch a channel's history into `inbox`; returns how many entries were new
    pub async fn fetch_history(&self, channel_id: &ChannelId, inbox: &Inbox) -> LinkResult<usize> {
        let records = self.mirror.channel_messages(channel_id, None).await?;
        Ok(inbox.ingest_all(&records))
    }

    /// Live records of a channel
    ///
    /// Feed them through [`Inbox::next_live`] to drop anything already held.
    pub fn subscribe(&self, channel_id: &ChannelId) -> BoxStream<'static, LedgerRecord> {
        self.mirror.subscribe(channel_id)
    }

    /// Poll the local inbound channel until the request is confirmed
    ///
    /// `max_attempts` counts every fetch. Returns `None` if the budget runs out.
    pub async fn wait_for_confirmation(
        &self,
        local: &LocalActor,
        inbox: &Inbox,
        sent: &SentRequest,
        max_attempts: u32,
        delay: Duration,
    ) -> LinkResult<Option<ConnectionRecord>> {
        let operator = local.operator();
        for attempt in 1..=max_attempts {
            self.fetch_history(&local.inbound_channel_id, inbox).await?;
            if let Some(record) = inbox.resolve_connection(
                &operator,
                &sent.target_inbound_channel_id,
                sent.request_id,
            ) {
                return Ok(Some(record));
            }
            if attempt < max_attempts {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(None)
    }
}

fn check_signer(local: &LocalActor, signer: &dyn LedgerSigner) -> LinkResult<()> {
    if &local.account_id != signer.account_id() {
        return Err(LinkError::InvalidInput(format!(
            "signer {} cannot act for {}",
            signer.account_id(),
            local.account_id
        )));
    }
    Ok(())
}

fn require_operator(operator_id: Option<&str>) -> LinkResult<OperatorId> {
    parse_operator_id(operator_id).ok_or_else(|| {
        LinkError::HandshakeOperatorMissing(operator_id.unwrap_or_default().to_string())
    })
}
