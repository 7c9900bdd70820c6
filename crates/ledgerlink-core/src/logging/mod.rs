//! Structured logging with JSON-lines output.
//!
//! Library code logs through `tracing` macros with key-value fields
//! (`run_id`, `step`, channel ids). Binaries and tests decide where that
//! goes: console, a JSONL file, or any writer.
//!
//! ## Usage
//!
//! ```ignore
//! use ledgerlink_core::logging::JsonlLayer;
//! use tracing_subscriber::prelude::*;
//!
//! let subscriber = tracing_subscriber::registry()
//!     .with(JsonlLayer::to_file("./logs/ledgerlink.jsonl", "ledgerlink")?)
//!     .with(tracing_subscriber::fmt::layer());
//!
//! tracing::subscriber::set_global_default(subscriber)?;
//! ```
//!
//! ### Querying logs with jq
//!
//! ```bash
//! # Every step of one publish run
//! jq 'select(.fields.run_id == "01J...")' logs/ledgerlink.jsonl
//!
//! # Unverified pointers
//! jq 'select(.fields.status == "skip")' logs/ledgerlink.jsonl
//! ```

pub mod entry;
pub mod layer;

pub use entry::JsonLogEntry;
pub use layer::{JsonlLayer, LoggingBuilder};
