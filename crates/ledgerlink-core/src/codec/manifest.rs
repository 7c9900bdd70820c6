//! Storage manifest carried in a document channel's memo
//!
//! Format: `<sha256Hex>:<codec>:<encoding>`, exactly three fields.

use sha2::{Digest, Sha256};

use super::CompressionCodec;
use crate::constants::MANIFEST_ENCODING;
use crate::error::{LinkError, LinkResult};

/// How to interpret the records stored on a document channel
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentManifest {
    /// Lowercase hex SHA-256 of the uncompressed document bytes
    pub content_hash: String,
    /// Compression applied before encoding
    pub codec: CompressionCodec,
    /// Transfer encoding of the payload (always base64)
    pub encoding: String,
}

impl DocumentManifest {
    /// Manifest for the given uncompressed bytes
    pub fn for_content(bytes: &[u8], codec: CompressionCodec) -> Self {
        Self {
            content_hash: content_hash(bytes),
            codec,
            encoding: MANIFEST_ENCODING.to_string(),
        }
    }

    /// Render as a channel memo
    pub fn to_memo(&self) -> String {
        format!("{}:{}:{}", self.content_hash, self.codec, self.encoding)
    }

    /// Parse a channel memo
    ///
    /// Fails with [`LinkError::DocumentIntegrity`] unless the memo has exactly
    /// three non-empty fields, a supported codec, and base64 encoding.
    pub fn parse(memo: &str) -> LinkResult<Self> {
        let fields: Vec<&str> = memo.split(':').collect();
        let [hash, codec, encoding] = fields.as_slice() else {
            return Err(LinkError::DocumentIntegrity(format!(
                "Manifest must have 3 fields, got {}: {:?}",
                fields.len(),
                memo
            )));
        };

        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(LinkError::DocumentIntegrity(format!(
                "Manifest hash is not hex: {:?}",
                hash
            )));
        }

        let codec = CompressionCodec::parse(codec)?;

        if *encoding != MANIFEST_ENCODING {
            return Err(LinkError::DocumentIntegrity(format!(
                "Unsupported manifest encoding: {:?}",
                encoding
            )));
        }

        Ok(Self {
            content_hash: hash.to_string(),
            codec,
            encoding: encoding.to_string(),
        })
    }

    /// Compare the manifest hash to bytes, ignoring hex case
    pub fn matches(&self, bytes: &[u8]) -> bool {
        self.content_hash.eq_ignore_ascii_case(&content_hash(bytes))
    }
}

/// Lowercase hex SHA-256 of bytes
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
