//! Protocol configuration
//!
//! Values callers may tune without touching wire formats. Every field has a
//! default, so a partial document deserializes into a usable config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::codec::CompressionCodec;
use crate::constants::{
    DEFAULT_CONFIRM_ATTEMPTS, DEFAULT_CONFIRM_DELAY_MS, DEFAULT_FRAGMENT_SIZE,
    DEFAULT_INBOX_CAPACITY, DEFAULT_TTL_SECONDS,
};
use crate::error::{LinkError, LinkResult};
use crate::types::ChannelId;

/// Network name used when none is configured
pub const DEFAULT_NETWORK: &str = "testnet";

/// Tunables for publishing and connections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// Ledger network name, part of every UAID
    pub network: String,
    /// TTL hint written into channel memos
    pub ttl_seconds: u32,
    /// Channel receiving registry announcements
    pub registry_channel_id: Option<ChannelId>,
    /// Characters per document chunk
    pub fragment_size: usize,
    /// Compression used for new documents
    pub codec: CompressionCodec,
    /// Replica reads when confirming a pointer update
    pub confirm_attempts: u32,
    /// Delay between confirmation reads
    pub confirm_delay_ms: u64,
    /// Entries kept per inbox before the oldest are evicted
    pub inbox_capacity: usize,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            ttl_seconds: DEFAULT_TTL_SECONDS,
            registry_channel_id: None,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
            codec: CompressionCodec::default(),
            confirm_attempts: DEFAULT_CONFIRM_ATTEMPTS,
            confirm_delay_ms: DEFAULT_CONFIRM_DELAY_MS,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }
}

impl ProtocolConfig {
    /// Set the registry channel
    pub fn with_registry(mut self, channel_id: ChannelId) -> Self {
        self.registry_channel_id = Some(channel_id);
        self
    }

    /// Delay between confirmation reads
    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> LinkResult<()> {
        if self.network.trim().is_empty() {
            return Err(LinkError::InvalidInput("network must not be empty".to_string()));
        }
        if self.fragment_size == 0 {
            return Err(LinkError::InvalidInput("fragment_size must be positive".to_string()));
        }
        if self.confirm_attempts == 0 {
            return Err(LinkError::InvalidInput(
                "confirm_attempts must be positive".to_string(),
            ));
        }
        if self.inbox_capacity == 0 {
            return Err(LinkError::InvalidInput("inbox_capacity must be positive".to_string()));
        }
        Ok(())
    }
}
