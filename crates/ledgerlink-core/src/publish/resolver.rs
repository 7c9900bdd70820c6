//! Resolve an account's published identity document

use std::sync::Arc;

use tracing::debug;

use crate::codec::{DocumentCodec, DocumentReference};
use crate::error::{LinkError, LinkResult};
use crate::identity::IdentityDocument;
use crate::ledger::MirrorNode;
use crate::types::AccountId;

/// A document found through an account's pointer
#[derive(Clone, Debug)]
pub struct ResolvedProfile {
    /// Where the document lives
    pub reference: DocumentReference,
    /// The decoded document
    pub document: IdentityDocument,
    /// Whether the stored bytes matched the manifest hash
    pub checksum_valid: bool,
}

/// Follows account memo pointers to identity documents
#[derive(Clone)]
pub struct ProfileResolver {
    mirror: Arc<dyn MirrorNode>,
    codec: DocumentCodec,
}

impl ProfileResolver {
    /// Resolver reading through `mirror`
    pub fn new(mirror: Arc<dyn MirrorNode>) -> Self {
        Self {
            mirror,
            codec: DocumentCodec::default(),
        }
    }

    /// Read the account's pointer and decode the document it names
    ///
    /// An account without a parseable pointer is
    /// [`LinkError::ProfileNotPublished`]; a pointer to a broken document
    /// fails with the codec's error.
    pub async fn resolve(&self, account_id: &AccountId) -> LinkResult<ResolvedProfile> {
        let memo = self
            .mirror
            .account_memo(account_id)
            .await?
            .ok_or_else(|| LinkError::ProfileNotPublished(account_id.to_string()))?;

        let reference = DocumentReference::from_pointer(&memo).map_err(|e| {
            debug!(%account_id, memo = %memo, error = %e, "Account memo is not a document pointer");
            LinkError::ProfileNotPublished(account_id.to_string())
        })?;

        let decoded = self.codec.fetch(self.mirror.as_ref(), &reference.channel_id).await?;

        Ok(ResolvedProfile {
            reference,
            document: decoded.document,
            checksum_valid: decoded.checksum_valid,
        })
    }
}
