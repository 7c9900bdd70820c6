//! Chunk records and data-URI framing
//!
//! An encoded document is a data URI (`data:<mime>;base64,<body>`) split
//! into fragments. Each fragment is submitted as its own ledger record
//! tagged with its offset; readers order by offset, never by arrival.

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};

/// One ledger record holding part of an encoded document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// Position of this fragment (0-based)
    pub offset: u64,
    /// Fragment of the data URI
    pub payload: String,
}

impl ChunkRecord {
    /// Split a data URI into fragments of at most `fragment_size` characters
    pub fn split(data_uri: &str, fragment_size: usize) -> Vec<ChunkRecord> {
        let chars: Vec<char> = data_uri.chars().collect();
        chars
            .chunks(fragment_size.max(1))
            .enumerate()
            .map(|(offset, fragment)| ChunkRecord {
                offset: offset as u64,
                payload: fragment.iter().collect(),
            })
            .collect()
    }

    /// Parse a record body, returning `None` for anything that is not a chunk
    pub fn parse(text: &str) -> Option<ChunkRecord> {
        serde_json::from_str(text).ok()
    }

    /// Reassemble fragments in offset order
    pub fn reassemble(mut chunks: Vec<ChunkRecord>) -> String {
        chunks.sort_by_key(|chunk| chunk.offset);
        chunks.into_iter().map(|chunk| chunk.payload).collect()
    }

    /// JSON body submitted to the ledger
    pub fn to_json(&self) -> LinkResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Frame bytes as a base64 data URI
pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

/// Split a base64 data URI into its mime type and decoded bytes
pub fn from_data_uri(data_uri: &str) -> LinkResult<(String, Vec<u8>)> {
    let rest = data_uri
        .strip_prefix("data:")
        .ok_or_else(|| LinkError::DocumentIntegrity("Payload is not a data URI".to_string()))?;
    let (mime_type, body) = rest.split_once(";base64,").ok_or_else(|| {
        LinkError::DocumentIntegrity("Data URI is not base64-encoded".to_string())
    })?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body)
        .map_err(|e| LinkError::DocumentIntegrity(format!("Invalid base64 body: {}", e)))?;
    Ok((mime_type.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes() {
        let uri = "a".repeat(25);
        let chunks = ChunkRecord::split(&uri, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].payload.len(), 5);
        assert_eq!(chunks.iter().map(|c| c.offset).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_reassemble_ignores_arrival_order() {
        let uri = "data:application/json;base64,eyJhIjoxfQ==";
        let mut chunks = ChunkRecord::split(uri, 7);
        chunks.reverse();
        chunks.swap(0, 2);
        assert_eq!(ChunkRecord::reassemble(chunks), uri);
    }

    #[test]
    fn test_parse_rejects_non_chunks() {
        assert!(ChunkRecord::parse(r#"{"offset":0,"payload":"x"}"#).is_some());
        assert!(ChunkRecord::parse(r#"{"offset":"0","payload":"x"}"#).is_none());
        assert!(ChunkRecord::parse(r#"{"offset":1}"#).is_none());
        assert!(ChunkRecord::parse("hello").is_none());
    }

    #[test]
    fn test_data_uri_framing() {
        let uri = to_data_uri("application/json", b"{\"a\":1}");
        assert_eq!(uri, "data:application/json;base64,eyJhIjoxfQ==");

        let (mime, bytes) = from_data_uri(&uri).unwrap();
        assert_eq!(mime, "application/json");
        assert_eq!(bytes, b"{\"a\":1}");
    }

    #[test]
    fn test_data_uri_errors() {
        assert!(from_data_uri("eyJhIjoxfQ==").is_err());
        assert!(from_data_uri("data:application/json,plain").is_err());
        assert!(from_data_uri("data:application/json;base64,***").is_err());
    }
}
