//! Ledgerlink Core Library
//!
//! Identity publishing and peer connections over an append-only public ledger.
//!
//! ## Overview
//!
//! An actor publishes an identity document to a ledger channel, points its
//! account memo at that channel, and announces itself in a discovery
//! registry. Other actors find it through that pointer and open a private
//! connection channel with a three-phase handshake over the public
//! inbound/outbound channels.
//!
//! ## Core Pieces
//!
//! - **Ledger seam**: [`LedgerClient`] (consensus writes) and [`MirrorNode`]
//!   (eventually consistent reads), with an in-memory implementation for tests
//! - **Document codec**: compression, content hashing, and chunking of
//!   identity documents into ledger records
//! - **Publishing**: the step-by-step workflow with progress events
//! - **Connections**: handshake, inbox, and operator identities
//!
//! ## Quick Start
//!
//! ```ignore
//! use ledgerlink_core::{
//!     IdentityPublisher, InMemoryLedger, LedgerClient, LedgerSigner, ProtocolConfig, PublishInput,
//!     PublishOptions, SubmitPolicy,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = InMemoryLedger::new();
//!     let signer = ledger.create_account();
//!     let operator = ledger.create_account();
//!     let registry = ledger.create_channel("registry", SubmitPolicy::Open, &operator).await?;
//!     let config = ProtocolConfig::default().with_registry(registry);
//!
//!     let publisher = IdentityPublisher::new(ledger.clone(), ledger.clone(), &config);
//!     let input = PublishInput::new(signer.account_id().clone(), "Alice").with_alias("alice");
//!
//!     let result = publisher
//!         .publish(input, &signer, PublishOptions::from_config(&config))
//!         .await?;
//!     println!("{} -> {}", result.uaid, result.document_reference);
//!
//!     Ok(())
//! }
//! ```

pub mod channels;
pub mod codec;
pub mod config;
pub mod connect;
pub mod constants;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod logging;
pub mod publish;
pub mod types;

// Re-exports
pub use channels::{ChannelMemo, ChannelProvisioner, ChannelPurpose, ChannelReference, Provisioned};
pub use codec::{CompressionCodec, DecodedDocument, DocumentCodec, DocumentManifest, DocumentReference};
pub use config::ProtocolConfig;
pub use connect::{
    parse_operator_id, ConnectionFailure, ConnectionProtocol, ConnectionRecord, HcsOperation,
    Inbox, InboxEvent, LocalActor, OperatorId,
};
pub use error::{LinkError, LinkResult};
pub use identity::{AccountSigner, IdentityDocument, LedgerSigner, ProfileType, Uaid};
pub use ledger::{InMemoryLedger, LedgerClient, LedgerRecord, MirrorLag, MirrorNode, SubmitPolicy};
pub use publish::{
    IdentityPublisher, ProfileResolver, PublishFailure, PublishInput, PublishOptions,
    PublishResult, PublishingStep, StepEvent, StepStatus,
};
pub use types::*;
