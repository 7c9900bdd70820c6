//! Identity publishing workflow
//!
//! ```text
//! ensure-inbound ─► ensure-outbound ─► store-document ─► update-pointer
//!                                                              │
//!              announce-registry ◄── verify-pointer ◄──────────┘
//! ```
//!
//! Steps run strictly one after another; each consumes identifiers the
//! previous ones produced. A failing step emits `fail` and stops the run.
//! Nothing is rolled back: the [`PublishFailure`] carries an input with
//! every channel created so far, and publishing that input again reuses
//! them.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use ulid::Ulid;

use super::events::{EventSink, PublishingStep, StepEvent};
use super::poller::MirrorConfirmationPoller;
use super::registry::{announce, RegistryAnnouncement, RegistrySubmission};
use crate::channels::{ChannelProvisioner, Provisioned};
use crate::codec::{CompressionCodec, DocumentCodec, DocumentReference};
use crate::config::ProtocolConfig;
use crate::error::{LinkError, LinkResult};
use crate::identity::{IdentityDocument, LedgerSigner, ProfileType, Uaid};
use crate::ledger::{LedgerClient, MirrorNode};
use crate::types::{AccountId, ChannelId};

/// What to publish, plus any channels that already exist
#[derive(Clone, Debug, PartialEq)]
pub struct PublishInput {
    /// Account publishing the document (must match the signer)
    pub account_id: AccountId,
    /// Name shown to other actors
    pub display_name: String,
    /// Short handle
    pub alias: Option<String>,
    /// Biography
    pub bio: Option<String>,
    /// Avatar reference
    pub avatar_reference: Option<String>,
    /// Actor kind
    pub profile_type: ProfileType,
    /// Known inbound channel; skips `ensure-inbound`
    pub inbound_channel_id: Option<ChannelId>,
    /// Known outbound channel; skips `ensure-outbound`
    pub outbound_channel_id: Option<ChannelId>,
    /// Already stored document; skips `store-document`
    pub document_channel_id: Option<ChannelId>,
    /// Extension data copied into the document
    pub extension_properties: Map<String, Value>,
}

impl PublishInput {
    /// Input for an account with no known channels
    pub fn new(account_id: impl Into<AccountId>, display_name: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            display_name: display_name.into(),
            alias: None,
            bio: None,
            avatar_reference: None,
            profile_type: ProfileType::Personal,
            inbound_channel_id: None,
            outbound_channel_id: None,
            document_channel_id: None,
            extension_properties: Map::new(),
        }
    }

    /// Set the alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Set the biography
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    /// Set the avatar reference
    pub fn with_avatar(mut self, avatar_reference: impl Into<String>) -> Self {
        self.avatar_reference = Some(avatar_reference.into());
        self
    }

    /// Set the actor kind
    pub fn with_profile_type(mut self, profile_type: ProfileType) -> Self {
        self.profile_type = profile_type;
        self
    }

    /// Reuse an inbound channel
    pub fn with_inbound_channel(mut self, channel_id: ChannelId) -> Self {
        self.inbound_channel_id = Some(channel_id);
        self
    }

    /// Reuse an outbound channel
    pub fn with_outbound_channel(mut self, channel_id: ChannelId) -> Self {
        self.outbound_channel_id = Some(channel_id);
        self
    }

    /// Reuse a stored document
    pub fn with_document_channel(mut self, channel_id: ChannelId) -> Self {
        self.document_channel_id = Some(channel_id);
        self
    }

    /// Add an extension property
    pub fn with_extension(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extension_properties.insert(key.into(), value);
        self
    }
}

/// Per-call knobs
#[derive(Clone, Debug)]
pub struct PublishOptions {
    /// Compression for a newly stored document
    pub codec: CompressionCodec,
    /// Receiver of step events
    pub events: Option<mpsc::UnboundedSender<StepEvent>>,
    /// Replica reads when verifying the pointer
    pub confirm_attempts: u32,
    /// Delay between verification reads
    pub confirm_delay: Duration,
    /// Stops pointer verification early (the pointer is then unverified)
    pub cancel: CancellationToken,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self::from_config(&ProtocolConfig::default())
    }
}

impl PublishOptions {
    /// Options taking codec and confirmation budget from a config
    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self {
            codec: config.codec,
            events: None,
            confirm_attempts: config.confirm_attempts,
            confirm_delay: config.confirm_delay(),
            cancel: CancellationToken::new(),
        }
    }

    /// Deliver step events to `sender`
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<StepEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Use a different compression codec
    pub fn with_codec(mut self, codec: CompressionCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Use a different confirmation budget
    pub fn with_confirmation(mut self, attempts: u32, delay: Duration) -> Self {
        self.confirm_attempts = attempts;
        self.confirm_delay = delay;
        self
    }

    /// Cancel verification through `token`
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

/// Outcome of a completed publish
#[derive(Clone, Debug, PartialEq)]
pub struct PublishResult {
    /// Identifies this run in events and logs
    pub run_id: Ulid,
    /// Inbound channel (reused or created)
    pub inbound_channel_id: ChannelId,
    /// Outbound channel (reused or created)
    pub outbound_channel_id: ChannelId,
    /// Channel holding the document
    pub document_channel_id: ChannelId,
    /// `hcs://1/<document channel>`
    pub document_reference: DocumentReference,
    /// Value written to the account memo (already truncated)
    pub pointer_value: String,
    /// Whether the pointer was observed on the read replica
    pub verified: bool,
    /// Registry record location
    pub registry: RegistrySubmission,
    /// Portable identifier written into the document
    pub uaid: Uaid,
    /// Whether this run created the inbound channel
    pub inbound_created: bool,
    /// Whether this run created the outbound channel
    pub outbound_created: bool,
}

/// A publish that stopped at `step`
#[derive(Error, Debug)]
#[error("Publishing failed at {step}: {error}")]
pub struct PublishFailure {
    /// Step that failed
    pub step: PublishingStep,
    /// Underlying error
    #[source]
    pub error: LinkError,
    /// The original input with every channel created before the failure filled in
    pub resume: PublishInput,
}

/// Runs the publishing workflow against a ledger
pub struct IdentityPublisher {
    ledger: Arc<dyn LedgerClient>,
    mirror: Arc<dyn MirrorNode>,
    provisioner: ChannelProvisioner,
    codec: DocumentCodec,
    network: String,
    registry_channel_id: Option<ChannelId>,
}

impl IdentityPublisher {
    /// Create a publisher
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        mirror: Arc<dyn MirrorNode>,
        config: &ProtocolConfig,
    ) -> Self {
        Self {
            provisioner: ChannelProvisioner::with_ttl(ledger.clone(), config.ttl_seconds),
            codec: DocumentCodec::new(config.fragment_size),
            network: config.network.clone(),
            registry_channel_id: config.registry_channel_id.clone(),
            ledger,
            mirror,
        }
    }

    /// Publish an identity document and announce it
    ///
    /// Only a [`PublishFailure`] aborts; an unconfirmed pointer is reported
    /// through [`PublishResult::verified`].
    pub async fn publish(
        &self,
        input: PublishInput,
        signer: &dyn LedgerSigner,
        options: PublishOptions,
    ) -> Result<PublishResult, PublishFailure> {
        let run_id = Ulid::new();
        let sink = EventSink::new(run_id, options.events.clone());
        let mut resume = input.clone();

        info!(%run_id, account = %input.account_id, "Publishing identity");

        if let Err(error) = check_input(&input, signer) {
            return Err(abort(&sink, PublishingStep::EnsureInbound, error, resume));
        }

        // ensure-inbound
        let step = PublishingStep::EnsureInbound;
        let inbound = match self
            .ensure_channel(&sink, step, input.inbound_channel_id.as_ref(), signer)
            .await
        {
            Ok(provisioned) => provisioned,
            Err(error) => return Err(abort(&sink, step, error, resume)),
        };
        resume.inbound_channel_id = Some(inbound.channel_id().clone());

        // ensure-outbound
        let step = PublishingStep::EnsureOutbound;
        let outbound = match self
            .ensure_channel(&sink, step, input.outbound_channel_id.as_ref(), signer)
            .await
        {
            Ok(provisioned) => provisioned,
            Err(error) => return Err(abort(&sink, step, error, resume)),
        };
        resume.outbound_channel_id = Some(outbound.channel_id().clone());

        // store-document
        let step = PublishingStep::StoreDocument;
        let uaid = Uaid::derive(&self.network, &input.account_id, input.alias.as_deref());
        let document = build_document(
            &input,
            inbound.channel_id().clone(),
            outbound.channel_id().clone(),
            &uaid,
        );
        let document_reference = match input
            .document_channel_id
            .as_ref()
            .filter(|id| !id.is_blank())
        {
            Some(channel_id) => {
                sink.skip(step, format!("document already stored on {}", channel_id), false);
                DocumentReference::new(channel_id.clone())
            }
            None => {
                sink.start(step);
                sink.progress(step, format!("encoding with {}", options.codec));
                match self
                    .codec
                    .store(self.ledger.as_ref(), signer, &document, options.codec)
                    .await
                {
                    Ok(stored) => {
                        sink.success(
                            step,
                            format!("{} ({} chunks)", stored.reference, stored.chunk_count),
                        );
                        stored.reference
                    }
                    Err(error) => return Err(abort(&sink, step, error, resume)),
                }
            }
        };
        resume.document_channel_id = Some(document_reference.channel_id.clone());

        // update-pointer
        let step = PublishingStep::UpdatePointer;
        sink.start(step);
        let pointer_value = document_reference.pointer_value();
        if let Err(error) = self.ledger.update_account_memo(&pointer_value, signer).await {
            return Err(abort(&sink, step, error, resume));
        }
        sink.success(step, pointer_value.clone());

        // verify-pointer
        let step = PublishingStep::VerifyPointer;
        sink.start(step);
        let poller = MirrorConfirmationPoller::with_budget(
            self.mirror.clone(),
            options.confirm_attempts,
            options.confirm_delay,
        );
        let verified = poller
            .confirm_with_cancel(&input.account_id, &pointer_value, &options.cancel)
            .await;
        if verified {
            sink.success(step, "pointer visible on read replica");
        } else {
            let reason = LinkError::MutationUnconfirmed(input.account_id.to_string());
            warn!(%run_id, error = %reason, "Continuing with unverified pointer");
            sink.skip(step, reason.to_string(), true);
        }

        // announce-registry
        let step = PublishingStep::AnnounceRegistry;
        sink.start(step);
        let announcement = RegistryAnnouncement::new(
            input.account_id.clone(),
            input.display_name.clone(),
            input.alias.clone(),
            document_reference.to_string(),
            document_reference.channel_id.clone(),
            uaid.to_string(),
            inbound.channel_id().clone(),
            outbound.channel_id().clone(),
        );
        let registry = match announce(
            self.ledger.as_ref(),
            signer,
            self.registry_channel_id.as_ref(),
            &announcement,
        )
        .await
        {
            Ok(submission) => submission,
            Err(error) => return Err(abort(&sink, step, error, resume)),
        };
        sink.success(step, format!("sequence {}", registry.sequence_number));

        info!(%run_id, reference = %document_reference, verified, "Published identity");

        Ok(PublishResult {
            run_id,
            inbound_channel_id: inbound.channel_id().clone(),
            outbound_channel_id: outbound.channel_id().clone(),
            document_channel_id: document_reference.channel_id.clone(),
            document_reference,
            pointer_value,
            verified,
            registry,
            uaid,
            inbound_created: inbound.was_created(),
            outbound_created: outbound.was_created(),
        })
    }

    async fn ensure_channel(
        &self,
        sink: &EventSink,
        step: PublishingStep,
        existing: Option<&ChannelId>,
        signer: &dyn LedgerSigner,
    ) -> LinkResult<Provisioned> {
        let known = existing.filter(|id| !id.is_blank());
        if known.is_none() {
            sink.start(step);
        }

        let provisioned = match step {
            PublishingStep::EnsureOutbound => self.provisioner.ensure_outbound(known, signer).await?,
            _ => self.provisioner.ensure_inbound(known, signer).await?,
        };

        match &provisioned {
            Provisioned::Reused(channel_id) => {
                sink.skip(step, format!("reusing {}", channel_id), false)
            }
            Provisioned::Created(reference) => sink.success(step, reference.channel_id.to_string()),
        }
        Ok(provisioned)
    }
}

fn check_input(input: &PublishInput, signer: &dyn LedgerSigner) -> LinkResult<()> {
    if input.account_id.is_blank() {
        return Err(LinkError::InvalidInput("accountId is required".to_string()));
    }
    if &input.account_id != signer.account_id() {
        return Err(LinkError::InvalidInput(format!(
            "signer {} cannot publish for {}",
            signer.account_id(),
            input.account_id
        )));
    }
    Ok(())
}

fn build_document(
    input: &PublishInput,
    inbound_channel_id: ChannelId,
    outbound_channel_id: ChannelId,
    uaid: &Uaid,
) -> IdentityDocument {
    IdentityDocument {
        schema_version: IdentityDocument::current_schema_version(),
        profile_type: input.profile_type,
        display_name: input.display_name.clone(),
        alias: input.alias.clone(),
        bio: input.bio.clone(),
        avatar_reference: input.avatar_reference.clone(),
        inbound_channel_id,
        outbound_channel_id,
        owner_account_id: input.account_id.clone(),
        uaid: uaid.to_string(),
        extension_properties: input.extension_properties.clone(),
    }
}

fn abort(
    sink: &EventSink,
    step: PublishingStep,
    error: LinkError,
    resume: PublishInput,
) -> PublishFailure {
    warn!(%step, error = %error, "Publishing aborted");
    sink.fail(step, error.to_string());
    PublishFailure {
        step,
        error,
        resume,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::AccountSigner;
    use crate::ledger::{InMemoryLedger, MirrorLag, SubmitPolicy};
    use crate::publish::StepStatus;

    async fn setup(lag: MirrorLag) -> (Arc<InMemoryLedger>, AccountSigner, IdentityPublisher) {
        let ledger = InMemoryLedger::with_mirror_lag(lag);
        let operator = ledger.create_account();
        let registry = ledger
            .create_channel("registry", SubmitPolicy::Open, &operator)
            .await
            .unwrap();
        let alice = ledger.create_account();
        let config = ProtocolConfig::default().with_registry(registry);
        let publisher = IdentityPublisher::new(ledger.clone(), ledger.clone(), &config);
        (ledger, alice, publisher)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<StepEvent>) -> Vec<(PublishingStep, &'static str)> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| (e.step, e.status.kind()))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_publish_event_sequence() {
        let (_ledger, alice, publisher) = setup(MirrorLag::Immediate).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let input = PublishInput::new(alice.account_id().clone(), "Alice").with_alias("alice");
        let result = publisher
            .publish(input, &alice, PublishOptions::default().with_events(tx))
            .await
            .unwrap();
        assert!(result.verified);
        assert!(result.inbound_created && result.outbound_created);

        use PublishingStep::*;
        assert_eq!(
            drain(&mut rx),
            vec![
                (EnsureInbound, "start"),
                (EnsureInbound, "success"),
                (EnsureOutbound, "start"),
                (EnsureOutbound, "success"),
                (StoreDocument, "start"),
                (StoreDocument, "progress"),
                (StoreDocument, "success"),
                (UpdatePointer, "start"),
                (UpdatePointer, "success"),
                (VerifyPointer, "start"),
                (VerifyPointer, "success"),
                (AnnounceRegistry, "start"),
                (AnnounceRegistry, "success"),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unverified_pointer_is_soft() {
        let (_ledger, alice, publisher) = setup(MirrorLag::Never).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        let result = publisher
            .publish(
                PublishInput::new(alice.account_id().clone(), "Alice"),
                &alice,
                PublishOptions::default().with_events(tx),
            )
            .await
            .unwrap();
        assert!(!result.verified);

        let events: Vec<StepEvent> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
        let verify = events
            .iter()
            .find(|e| e.step == PublishingStep::VerifyPointer && e.status.kind() == "skip")
            .unwrap();
        assert!(matches!(
            verify.status,
            StepStatus::Skip {
                unverified: true,
                ..
            }
        ));
        assert!(events
            .iter()
            .any(|e| e.step == PublishingStep::AnnounceRegistry && e.status.kind() == "success"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_signer_mismatch_rejected() {
        let (ledger, alice, publisher) = setup(MirrorLag::Immediate).await;
        let bob = ledger.create_account();

        let failure = publisher
            .publish(
                PublishInput::new(bob.account_id().clone(), "Bob"),
                &alice,
                PublishOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(failure.step, PublishingStep::EnsureInbound);
        assert!(matches!(failure.error, LinkError::InvalidInput(_)));
        assert_eq!(ledger.channel_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_carries_resume_input() {
        let (ledger, alice, publisher) = setup(MirrorLag::Immediate).await;
        ledger.fail_next_memo_update();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let failure = publisher
            .publish(
                PublishInput::new(alice.account_id().clone(), "Alice"),
                &alice,
                PublishOptions::default().with_events(tx),
            )
            .await
            .unwrap_err();
        assert_eq!(failure.step, PublishingStep::UpdatePointer);
        assert!(failure.resume.inbound_channel_id.is_some());
        assert!(failure.resume.outbound_channel_id.is_some());
        assert!(failure.resume.document_channel_id.is_some());

        let events = drain(&mut rx);
        assert_eq!(events.last(), Some(&(PublishingStep::UpdatePointer, "fail")));
        assert!(!events.iter().any(|(step, _)| *step == PublishingStep::VerifyPointer));

        // Retrying creates nothing new
        let channels = ledger.channel_count();
        let result = publisher
            .publish(failure.resume, &alice, PublishOptions::default())
            .await
            .unwrap();
        assert_eq!(ledger.channel_count(), channels);
        assert!(!result.inbound_created);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_failure_is_fatal() {
        let ledger = InMemoryLedger::new();
        let alice = ledger.create_account();
        let publisher =
            IdentityPublisher::new(ledger.clone(), ledger.clone(), &ProtocolConfig::default());

        let failure = publisher
            .publish(
                PublishInput::new(alice.account_id().clone(), "Alice"),
                &alice,
                PublishOptions::default(),
            )
            .await
            .unwrap_err();
        assert_eq!(failure.step, PublishingStep::AnnounceRegistry);
        assert!(matches!(failure.error, LinkError::RegistryAnnouncement(_)));
        assert_eq!(
            failure.to_string(),
            "Publishing failed at announce-registry: Registry announcement failed: No registry channel configured"
        );
    }
}
