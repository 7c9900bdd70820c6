//! Step events emitted while publishing
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  PublishingStep (total order)                                   │
//! │  ensure-inbound → ensure-outbound → store-document →            │
//! │  update-pointer → verify-pointer → announce-registry            │
//! │                                                                 │
//! │  StepStatus                                                     │
//! │  ├── Start:    step began                                       │
//! │  ├── Progress: intermediate detail (chunk counts, attempts)     │
//! │  ├── Success:  step completed                                   │
//! │  ├── Skip:     prerequisite already held, or soft failure       │
//! │  └── Fail:     step failed, remaining steps aborted             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Events are delivered to the caller over an unbounded channel so the
//! publisher never waits on a consumer.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use ulid::Ulid;

/// One step of the publishing workflow
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PublishingStep {
    /// Reuse or create the inbound channel
    EnsureInbound,
    /// Reuse or create the outbound channel
    EnsureOutbound,
    /// Store the identity document
    StoreDocument,
    /// Point the account memo at the document
    UpdatePointer,
    /// Confirm the pointer is visible on the read replica
    VerifyPointer,
    /// Submit the discovery-registry record
    AnnounceRegistry,
}

impl PublishingStep {
    /// Every step in execution order
    pub const ALL: [PublishingStep; 6] = [
        PublishingStep::EnsureInbound,
        PublishingStep::EnsureOutbound,
        PublishingStep::StoreDocument,
        PublishingStep::UpdatePointer,
        PublishingStep::VerifyPointer,
        PublishingStep::AnnounceRegistry,
    ];

    /// Step identifier as shown to users
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishingStep::EnsureInbound => "ensure-inbound",
            PublishingStep::EnsureOutbound => "ensure-outbound",
            PublishingStep::StoreDocument => "store-document",
            PublishingStep::UpdatePointer => "update-pointer",
            PublishingStep::VerifyPointer => "verify-pointer",
            PublishingStep::AnnounceRegistry => "announce-registry",
        }
    }
}

impl fmt::Display for PublishingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a step
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepStatus {
    /// Step began
    Start,
    /// Intermediate detail
    Progress {
        /// Human-readable progress note
        message: String,
    },
    /// Step completed
    Success {
        /// Human-readable result (usually the identifier produced)
        detail: String,
    },
    /// Step did not run, or ran and was downgraded
    Skip {
        /// Why the step was skipped
        reason: String,
        /// Set when a mutation could not be confirmed
        #[serde(default)]
        unverified: bool,
    },
    /// Step failed; nothing after it runs
    Fail {
        /// Error message
        message: String,
    },
}

impl StepStatus {
    /// Short name of the status kind
    pub fn kind(&self) -> &'static str {
        match self {
            StepStatus::Start => "start",
            StepStatus::Progress { .. } => "progress",
            StepStatus::Success { .. } => "success",
            StepStatus::Skip { .. } => "skip",
            StepStatus::Fail { .. } => "fail",
        }
    }
}

/// A status change of one step within one publish run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Identifies the publish invocation
    pub run_id: Ulid,
    /// Step the event is about
    pub step: PublishingStep,
    /// What happened
    #[serde(flatten)]
    pub status: StepStatus,
}

/// Delivers step events to an optional caller-owned receiver and the log
#[derive(Clone, Debug)]
pub(crate) struct EventSink {
    run_id: Ulid,
    sender: Option<mpsc::UnboundedSender<StepEvent>>,
}

impl EventSink {
    pub(crate) fn new(run_id: Ulid, sender: Option<mpsc::UnboundedSender<StepEvent>>) -> Self {
        Self { run_id, sender }
    }

    pub(crate) fn emit(&self, step: PublishingStep, status: StepStatus) {
        info!(run_id = %self.run_id, %step, status = status.kind(), "Publish step");

        if let Some(sender) = &self.sender {
            // A dropped receiver just means nobody is watching
            let _ = sender.send(StepEvent {
                run_id: self.run_id,
                step,
                status,
            });
        }
    }

    pub(crate) fn start(&self, step: PublishingStep) {
        self.emit(step, StepStatus::Start);
    }

    pub(crate) fn progress(&self, step: PublishingStep, message: impl Into<String>) {
        self.emit(
            step,
            StepStatus::Progress {
                message: message.into(),
            },
        );
    }

    pub(crate) fn success(&self, step: PublishingStep, detail: impl Into<String>) {
        self.emit(
            step,
            StepStatus::Success {
                detail: detail.into(),
            },
        );
    }

    pub(crate) fn skip(&self, step: PublishingStep, reason: impl Into<String>, unverified: bool) {
        self.emit(
            step,
            StepStatus::Skip {
                reason: reason.into(),
                unverified,
            },
        );
    }

    pub(crate) fn fail(&self, step: PublishingStep, message: impl Into<String>) {
        self.emit(
            step,
            StepStatus::Fail {
                message: message.into(),
            },
        );
    }
}
