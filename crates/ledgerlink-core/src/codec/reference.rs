//! Document references and actor metadata pointers
//!
//! ```text
//! reference: hcs://1/0.0.1234
//! pointer:   hcs-11:hcs://1/0.0.1234     (truncated to 99 bytes)
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{
    truncate_utf8, DOCUMENT_PROTOCOL_TAG, MAX_POINTER_BYTES, REFERENCE_SCHEME, REFERENCE_VERSION,
};
use crate::error::{LinkError, LinkResult};
use crate::types::ChannelId;

/// Reference to a document stored on a channel (`scheme://version/channelId`)
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentReference {
    /// Storage standard version
    pub version: u32,
    /// Channel holding the chunks
    pub channel_id: ChannelId,
}

impl DocumentReference {
    /// Reference to a channel using the current storage version
    pub fn new(channel_id: ChannelId) -> Self {
        Self {
            version: REFERENCE_VERSION,
            channel_id,
        }
    }

    /// Parse `scheme://version/channelId`
    pub fn parse(value: &str) -> LinkResult<Self> {
        let rest = value
            .strip_prefix(REFERENCE_SCHEME)
            .and_then(|r| r.strip_prefix("://"))
            .ok_or_else(|| LinkError::InvalidMemo(format!("Not a document reference: {:?}", value)))?;

        let (version, channel) = rest
            .split_once('/')
            .ok_or_else(|| LinkError::InvalidMemo(format!("Reference missing channel: {:?}", value)))?;

        let version = version
            .parse::<u32>()
            .map_err(|_| LinkError::InvalidMemo(format!("Reference version not numeric: {:?}", value)))?;

        if channel.is_empty() || channel.contains('/') {
            return Err(LinkError::InvalidMemo(format!(
                "Reference channel malformed: {:?}",
                value
            )));
        }

        Ok(Self {
            version,
            channel_id: ChannelId::new(channel),
        })
    }

    /// Actor metadata pointer value, truncated to the mutation-size limit
    pub fn pointer_value(&self) -> String {
        let full = format!("{}:{}", DOCUMENT_PROTOCOL_TAG, self);
        truncate_utf8(&full, MAX_POINTER_BYTES).to_string()
    }

    /// Parse an actor metadata pointer back into a reference
    pub fn from_pointer(pointer: &str) -> LinkResult<Self> {
        let reference = pointer
            .strip_prefix(DOCUMENT_PROTOCOL_TAG)
            .and_then(|r| r.strip_prefix(':'))
            .ok_or_else(|| LinkError::InvalidMemo(format!("Not a document pointer: {:?}", pointer)))?;
        Self::parse(reference)
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", REFERENCE_SCHEME, self.version, self.channel_id)
    }
}

impl FromStr for DocumentReference {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_format() {
        let reference = DocumentReference::new(ChannelId::new("0.0.1234"));
        assert_eq!(reference.to_string(), "hcs://1/0.0.1234");
        assert_eq!(reference.pointer_value(), "hcs-11:hcs://1/0.0.1234");
    }

    #[test]
    fn test_reference_parse() {
        let reference: DocumentReference = "hcs://1/0.0.99".parse().unwrap();
        assert_eq!(reference.version, 1);
        assert_eq!(reference.channel_id, ChannelId::new("0.0.99"));

        assert!(DocumentReference::parse("ipfs://1/0.0.99").is_err());
        assert!(DocumentReference::parse("hcs://x/0.0.99").is_err());
        assert!(DocumentReference::parse("hcs://1/").is_err());
        assert!(DocumentReference::parse("hcs://1").is_err());
    }

    #[test]
    fn test_pointer_roundtrip() {
        let reference = DocumentReference::new(ChannelId::new("0.0.5"));
        let back = DocumentReference::from_pointer(&reference.pointer_value()).unwrap();
        assert_eq!(back, reference);
        assert!(DocumentReference::from_pointer("hcs://1/0.0.5").is_err());
    }

    #[test]
    fn test_pointer_truncated_to_ceiling() {
        let reference = DocumentReference::new(ChannelId::new("9".repeat(200)));
        let pointer = reference.pointer_value();
        assert_eq!(pointer.len(), MAX_POINTER_BYTES);
        assert!(pointer.starts_with("hcs-11:hcs://1/"));
    }
}
