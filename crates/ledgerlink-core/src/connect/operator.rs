//! Operator identity: `<inboundChannelId>@<accountId>`

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, ChannelId};

/// Who is acting, and through which inbound channel they can be reached
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorId {
    /// The actor's inbound channel
    pub channel_id: ChannelId,
    /// The actor's account
    pub account_id: AccountId,
}

impl OperatorId {
    /// Operator acting as `account_id` through `channel_id`
    pub fn new(channel_id: ChannelId, account_id: AccountId) -> Self {
        Self {
            channel_id,
            account_id,
        }
    }

    /// Parse `<channelId>@<accountId>`; anything malformed is `None`
    pub fn parse(value: &str) -> Option<Self> {
        let (channel, account) = value.trim().split_once('@')?;
        if channel.is_empty() || account.is_empty() || account.contains('@') {
            return None;
        }
        Some(Self::new(ChannelId::new(channel), AccountId::new(account)))
    }
}

impl fmt::Display for OperatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.channel_id, self.account_id)
    }
}

/// Parse an optional operator string
///
/// Missing, empty, and half-specified values all mean "no operator".
pub fn parse_operator_id(value: Option<&str>) -> Option<OperatorId> {
    value.and_then(OperatorId::parse)
}
