//! Core identifier types shared across the ledger, codec, and protocol layers

use serde::{Deserialize, Serialize};

/// Implements the common surface of an opaque ledger entity identifier.
///
/// Ledger identifiers are shard.realm.num strings (`0.0.1234`) but nothing in
/// this crate depends on that shape, so they are carried as opaque text.
macro_rules! ledger_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier string
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the identifier as a string slice
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// True if the identifier is empty or whitespace
            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

ledger_id!(
    /// Identifier of a ledger channel (an append-only, publicly readable topic)
    ChannelId
);

ledger_id!(
    /// Identifier of a wallet-controlled ledger account
    AccountId
);

/// Consensus timestamp assigned by the ledger
pub type ConsensusTimestamp = chrono::DateTime<chrono::Utc>;
