//! Identity publishing
//!
//! [`IdentityPublisher`] drives the channel provisioner, the document codec,
//! the pointer update, the [`MirrorConfirmationPoller`], and the registry
//! announcement as one observable workflow. [`ProfileResolver`] walks the
//! same path backwards.

mod events;
mod orchestrator;
mod poller;
mod registry;
mod resolver;

pub use events::{PublishingStep, StepEvent, StepStatus};
pub use orchestrator::{
    IdentityPublisher, PublishFailure, PublishInput, PublishOptions, PublishResult,
};
pub use poller::MirrorConfirmationPoller;
pub use registry::{announce, RegistryAnnouncement, RegistrySubmission};
pub use resolver::{ProfileResolver, ResolvedProfile};
