//! Discovery-registry announcement

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{REGISTRY_STANDARD, REGISTRY_VERSION};
use crate::error::{LinkError, LinkResult};
use crate::identity::LedgerSigner;
use crate::ledger::LedgerClient;
use crate::types::{AccountId, ChannelId, ConsensusTimestamp};

/// Record announcing an actor's document and inboxes to the registry
///
/// Key casing is mixed on the wire; it is kept exactly as registry readers expect.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryAnnouncement {
    /// Registry standard tag
    pub standard: String,
    /// Registry record version
    pub version: String,
    /// Announcing account
    #[serde(rename = "accountId")]
    pub account_id: AccountId,
    /// Display name from the document
    pub display_name: String,
    /// Alias, if the actor has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// `hcs://1/<channel>` reference to the document
    pub document_reference: String,
    /// Channel holding the document
    pub document_channel_id: ChannelId,
    /// Portable actor identifier
    pub uaid: String,
    /// Inbound channel
    pub inbound_channel_id: ChannelId,
    /// Outbound channel
    pub outbound_channel_id: ChannelId,
    /// RFC 3339 time the announcement was built
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl RegistryAnnouncement {
    /// Build an announcement stamped with the current time
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        account_id: AccountId,
        display_name: impl Into<String>,
        alias: Option<String>,
        document_reference: impl Into<String>,
        document_channel_id: ChannelId,
        uaid: impl Into<String>,
        inbound_channel_id: ChannelId,
        outbound_channel_id: ChannelId,
    ) -> Self {
        Self {
            standard: REGISTRY_STANDARD.to_string(),
            version: REGISTRY_VERSION.to_string(),
            account_id,
            display_name: display_name.into(),
            alias,
            document_reference: document_reference.into(),
            document_channel_id,
            uaid: uaid.into(),
            inbound_channel_id,
            outbound_channel_id,
            updated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Where the ledger recorded an announcement
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySubmission {
    /// Registry channel the record landed on
    pub channel_id: ChannelId,
    /// Consensus-assigned sequence number
    pub sequence_number: u64,
    /// Consensus-assigned timestamp
    pub consensus_timestamp: ConsensusTimestamp,
}

/// Submit an announcement to the registry channel
///
/// Every failure, including a missing registry channel, is reported as
/// [`LinkError::RegistryAnnouncement`].
pub async fn announce(
    ledger: &dyn LedgerClient,
    signer: &dyn LedgerSigner,
    registry_channel: Option<&ChannelId>,
    announcement: &RegistryAnnouncement,
) -> LinkResult<RegistrySubmission> {
    let channel_id = registry_channel
        .filter(|id| !id.is_blank())
        .ok_or_else(|| LinkError::RegistryAnnouncement("No registry channel configured".to_string()))?;

    let payload = serde_json::to_vec(announcement)
        .map_err(|e| LinkError::RegistryAnnouncement(e.to_string()))?;

    let receipt = ledger
        .submit_message(channel_id, &payload, signer)
        .await
        .map_err(|e| LinkError::RegistryAnnouncement(e.to_string()))?;

    info!(
        registry = %channel_id,
        sequence = receipt.sequence_number,
        account = %announcement.account_id,
        "Announced to registry"
    );

    Ok(RegistrySubmission {
        channel_id: receipt.channel_id,
        sequence_number: receipt.sequence_number,
        consensus_timestamp: receipt.consensus_timestamp,
    })
}
