//! Identity module for ledgerlink
//!
//! ## Overview
//!
//! The identity system provides:
//! - **Signers**: the caller-supplied capability to sign ledger transactions
//! - **UAIDs**: portable identifiers in the format
//!   `uaid:did:z{base58};uid=..;proto=hcs-10;nativeId=hedera:{network}:{account}`
//! - **Identity documents**: the versioned record an actor publishes
//!
//! ## Example
//!
//! ```rust
//! use ledgerlink_core::identity::{AccountSigner, LedgerSigner, Uaid};
//!
//! let signer = AccountSigner::generate("0.0.1234");
//! let uaid = Uaid::derive("testnet", signer.account_id(), Some("alice"));
//!
//! assert_eq!(uaid.uid(), "alice");
//! assert_eq!(uaid.native_id(), "hedera:testnet:0.0.1234");
//! ```

mod document;
mod signer;
mod uaid;

pub use document::{IdentityDocument, ProfileType};
pub use signer::{
    memo_update_body, submission_body, verify_signature, AccountSigner, LedgerSigner,
};
pub use uaid::{normalize_alias, Uaid};
