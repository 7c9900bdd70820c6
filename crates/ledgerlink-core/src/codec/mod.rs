//! Chunked document codec
//!
//! Stores an [`IdentityDocument`] on its own channel and reads it back.
//!
//! ## Encoding
//!
//! ```text
//! document ──serde_json──► bytes ──sha256──► manifest memo  (channel memo)
//!                            │
//!                            └─compress─► base64 ─► data:<mime>;base64,...
//!                                                        │
//!                                             split every N chars
//!                                                        ▼
//!                                 {"offset":0,"payload":"data:app..."}   record 1
//!                                 {"offset":1,"payload":"..."}           record 2
//! ```
//!
//! ## Decoding
//!
//! The manifest is validated before any record is touched, so an
//! unsupported codec fails without attempting decompression. Records that
//! are not chunks are ignored. A hash mismatch does not fail decoding; it
//! is reported through [`DecodedDocument::checksum_valid`].

mod chunk;
mod compression;
mod manifest;
mod reference;

pub use chunk::{from_data_uri, to_data_uri, ChunkRecord};
pub use compression::CompressionCodec;
pub use manifest::{content_hash, DocumentManifest};
pub use reference::DocumentReference;

use tracing::{debug, warn};

use crate::constants::{DEFAULT_FRAGMENT_SIZE, DOCUMENT_MIME_TYPE};
use crate::error::{LinkError, LinkResult};
use crate::identity::{IdentityDocument, LedgerSigner};
use crate::ledger::{LedgerClient, LedgerRecord, MirrorNode, SubmitPolicy};
use crate::types::ChannelId;

/// A document ready to be written to a channel
#[derive(Clone, Debug)]
pub struct EncodedDocument {
    /// Memo for the document channel
    pub manifest: DocumentManifest,
    /// Records to submit, in offset order
    pub chunks: Vec<ChunkRecord>,
    /// The full data URI the chunks were cut from
    pub data_uri: String,
}

/// Outcome of storing a document
#[derive(Clone, Debug, PartialEq)]
pub struct StoredDocument {
    /// Channel holding the document
    pub channel_id: ChannelId,
    /// `hcs://1/<channel>` reference to it
    pub reference: DocumentReference,
    /// Manifest written as the channel memo
    pub manifest: DocumentManifest,
    /// Number of chunk records submitted
    pub chunk_count: usize,
}

/// A document read back from a channel
#[derive(Clone, Debug)]
pub struct DecodedDocument {
    /// Parsed document
    pub document: IdentityDocument,
    /// Mime type recovered from the data URI
    pub mime_type: String,
    /// Decompressed document bytes
    pub bytes: Vec<u8>,
    /// Whether the bytes hash to the manifest's content hash
    pub checksum_valid: bool,
    /// Manifest the document was decoded with
    pub manifest: DocumentManifest,
}

/// Encodes identity documents into chunk records and decodes them back
#[derive(Clone, Debug)]
pub struct DocumentCodec {
    fragment_size: usize,
}

impl Default for DocumentCodec {
    fn default() -> Self {
        Self::new(DEFAULT_FRAGMENT_SIZE)
    }
}

impl DocumentCodec {
    /// Codec that cuts data URIs into fragments of `fragment_size` characters
    pub fn new(fragment_size: usize) -> Self {
        Self {
            fragment_size: fragment_size.max(1),
        }
    }

    /// Fragment size in characters
    pub fn fragment_size(&self) -> usize {
        self.fragment_size
    }

    /// Encode a document without touching the ledger
    pub fn encode(
        &self,
        document: &IdentityDocument,
        codec: CompressionCodec,
    ) -> LinkResult<EncodedDocument> {
        let bytes = document.to_bytes()?;
        let manifest = DocumentManifest::for_content(&bytes, codec);
        let compressed = codec.compress(&bytes)?;
        let data_uri = to_data_uri(DOCUMENT_MIME_TYPE, &compressed);
        let chunks = ChunkRecord::split(&data_uri, self.fragment_size);

        debug!(
            raw = bytes.len(),
            compressed = compressed.len(),
            chunks = chunks.len(),
            %codec,
            "Encoded document"
        );

        Ok(EncodedDocument {
            manifest,
            chunks,
            data_uri,
        })
    }

    /// Create a document channel and submit every chunk to it
    ///
    /// Only the signer may write to the channel. Failure to create the
    /// channel is a [`LinkError::ChannelResolution`] for purpose `document`;
    /// a failed chunk submission propagates as-is.
    pub async fn store(
        &self,
        ledger: &dyn LedgerClient,
        signer: &dyn LedgerSigner,
        document: &IdentityDocument,
        codec: CompressionCodec,
    ) -> LinkResult<StoredDocument> {
        let encoded = self.encode(document, codec)?;

        let channel_id = ledger
            .create_channel(
                &encoded.manifest.to_memo(),
                SubmitPolicy::Single(signer.public_key()),
                signer,
            )
            .await
            .map_err(|e| LinkError::channel_resolution("document", e))?;

        for chunk in &encoded.chunks {
            ledger
                .submit_message(&channel_id, chunk.to_json()?.as_bytes(), signer)
                .await?;
        }

        debug!(%channel_id, chunks = encoded.chunks.len(), "Stored document");

        Ok(StoredDocument {
            reference: DocumentReference::new(channel_id.clone()),
            channel_id,
            manifest: encoded.manifest,
            chunk_count: encoded.chunks.len(),
        })
    }

    /// Read a document back from its channel
    pub async fn fetch(
        &self,
        mirror: &dyn MirrorNode,
        channel_id: &ChannelId,
    ) -> LinkResult<DecodedDocument> {
        let memo = mirror.channel_memo(channel_id).await?;
        // Reject the manifest before paying for the record fetch
        DocumentManifest::parse(&memo)?;
        let records = mirror.channel_messages(channel_id, None).await?;
        self.decode_records(&memo, &records)
    }

    /// Decode a document from a manifest memo and the channel's records
    pub fn decode_records(&self, memo: &str, records: &[LedgerRecord]) -> LinkResult<DecodedDocument> {
        let manifest = DocumentManifest::parse(memo)?;

        let chunks: Vec<ChunkRecord> = records
            .iter()
            .filter_map(|record| ChunkRecord::parse(&record.payload_text()))
            .collect();
        if chunks.is_empty() {
            return Err(LinkError::DocumentIntegrity(
                "Channel holds no document chunks".to_string(),
            ));
        }

        let data_uri = ChunkRecord::reassemble(chunks);
        let (mime_type, compressed) = from_data_uri(&data_uri)?;
        let bytes = manifest
            .codec
            .decompress(&compressed)
            .map_err(|e| LinkError::DocumentIntegrity(e.to_string()))?;

        let text = std::str::from_utf8(&bytes)
            .map_err(|e| LinkError::DocumentIntegrity(format!("Document is not UTF-8: {}", e)))?;
        let document = IdentityDocument::from_json(text)?;

        let checksum_valid = manifest.matches(&bytes);
        if !checksum_valid {
            warn!(
                expected = %manifest.content_hash,
                actual = %content_hash(&bytes),
                "Document checksum mismatch"
            );
        }

        Ok(DecodedDocument {
            document,
            mime_type,
            bytes,
            checksum_valid,
            manifest,
        })
    }
}
