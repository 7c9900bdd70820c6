//! Peer connection protocol
//!
//! Three-phase handshake (request, confirmation, messages on a shared
//! channel) between actors that only know each other's inbound channel.
//! See [`protocol`] for the message flow.
//!
//! Records are decoded into tagged variants ([`HcsOperation`]) and gathered
//! in an [`Inbox`], which merges history and live delivery into one
//! ordered timeline without duplicates.

mod envelope;
mod inbox;
mod operator;
pub mod protocol;

pub use envelope::{decode_inbound, decode_record, DirectMessage, HcsEnvelope, HcsOperation, InboundMessage};
pub use inbox::{
    ChannelMessage, ConnectionCreatedEvent, ConnectionRecord, ConnectionRequestEvent, Inbox,
    InboxEntry, InboxEvent,
};
pub use operator::{parse_operator_id, OperatorId};
pub use protocol::{ConnectionFailure, ConnectionProtocol, LocalActor, RequestDetails, SentRequest};
