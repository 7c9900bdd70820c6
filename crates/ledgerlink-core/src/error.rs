//! Error types for ledgerlink

use thiserror::Error;

/// Main error type for identity publishing and connection operations
#[derive(Error, Debug)]
pub enum LinkError {
    /// A required channel could not be found or created
    #[error("Channel resolution failed for {purpose} channel: {reason}")]
    ChannelResolution {
        /// Which channel was being resolved (inbound, outbound, document, connection)
        purpose: String,
        /// Underlying cause
        reason: String,
    },

    /// A stored document could not be interpreted (bad manifest, unsupported codec, bad body)
    ///
    /// A checksum mismatch is NOT reported through this variant; it is a flag
    /// on the decoded document.
    #[error("Document integrity failure: {0}")]
    DocumentIntegrity(String),

    /// A submitted mutation never became visible on the read replica
    #[error("Mutation not confirmed for account {0}")]
    MutationUnconfirmed(String),

    /// Operator identity absent or malformed, so the recipient cannot be addressed
    #[error("Operator identity missing or malformed: {0:?}")]
    HandshakeOperatorMissing(String),

    /// The discovery-registry record could not be submitted
    #[error("Registry announcement failed: {0}")]
    RegistryAnnouncement(String),

    /// Channel does not exist on the ledger
    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// Account does not exist on the ledger
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Ledger rejected or failed a transaction
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// Error during serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Signature did not satisfy the channel or account key
    #[error("Signature invalid: {0}")]
    SignatureInvalid(String),

    /// Channel memo or pointer did not match any known format
    #[error("Invalid memo: {0}")]
    InvalidMemo(String),

    /// Identifier-related error (UAID parsing, key material)
    #[error("Identity error: {0}")]
    Identity(String),

    /// Caller supplied unusable input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Account has no (parseable) identity document pointer
    #[error("No published profile for account {0}")]
    ProfileNotPublished(String),

    /// JSON encoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LinkError {
    /// Build a channel resolution error for the given purpose
    pub fn channel_resolution(purpose: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        LinkError::ChannelResolution {
            purpose: purpose.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias using LinkError
pub type LinkResult<T> = Result<T, LinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LinkError::channel_resolution("inbound", "ledger unavailable");
        assert_eq!(
            format!("{}", err),
            "Channel resolution failed for inbound channel: ledger unavailable"
        );
    }

    #[test]
    fn test_operator_missing_shows_raw_value() {
        let err = LinkError::HandshakeOperatorMissing("topicOnly".to_string());
        assert_eq!(
            err.to_string(),
            "Operator identity missing or malformed: \"topicOnly\""
        );
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: LinkError = json_err.into();
        assert!(matches!(err, LinkError::Json(_)));
    }
}
