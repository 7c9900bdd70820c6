//! Compression codecs for stored documents

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, LinkResult};

/// zstd level used for documents (fast with good compression)
const ZSTD_LEVEL: i32 = 3;

/// Brotli quality and window
const BROTLI_QUALITY: u32 = 9;
const BROTLI_WINDOW: u32 = 22;
const BROTLI_BUFFER: usize = 4096;

/// Compression applied to a document before base64 encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionCodec {
    /// Stored as-is
    #[default]
    None,
    /// Zstandard
    Zstd,
    /// Brotli
    Brotli,
}

impl CompressionCodec {
    /// Every codec this crate can write
    pub const ALL: [CompressionCodec; 3] = [
        CompressionCodec::None,
        CompressionCodec::Zstd,
        CompressionCodec::Brotli,
    ];

    /// Name written into manifests
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionCodec::None => "none",
            CompressionCodec::Zstd => "zstd",
            CompressionCodec::Brotli => "brotli",
        }
    }

    /// Parse a manifest codec name
    ///
    /// Accepts the aliases `identity` (none) and `br` (brotli). Any other
    /// name is a [`LinkError::DocumentIntegrity`] failure.
    pub fn parse(name: &str) -> LinkResult<Self> {
        match name {
            "none" | "identity" => Ok(CompressionCodec::None),
            "zstd" => Ok(CompressionCodec::Zstd),
            "brotli" | "br" => Ok(CompressionCodec::Brotli),
            other => Err(LinkError::DocumentIntegrity(format!(
                "Unsupported compression codec: {:?}",
                other
            ))),
        }
    }

    /// Compress bytes
    pub fn compress(&self, bytes: &[u8]) -> LinkResult<Vec<u8>> {
        match self {
            CompressionCodec::None => Ok(bytes.to_vec()),
            CompressionCodec::Zstd => zstd::encode_all(bytes, ZSTD_LEVEL)
                .map_err(|e| LinkError::Compression(format!("zstd compression failed: {}", e))),
            CompressionCodec::Brotli => {
                let mut out = Vec::new();
                {
                    let mut writer = brotli::CompressorWriter::new(
                        &mut out,
                        BROTLI_BUFFER,
                        BROTLI_QUALITY,
                        BROTLI_WINDOW,
                    );
                    writer.write_all(bytes).map_err(|e| {
                        LinkError::Compression(format!("brotli compression failed: {}", e))
                    })?;
                    writer.flush().map_err(|e| {
                        LinkError::Compression(format!("brotli compression failed: {}", e))
                    })?;
                }
                Ok(out)
            }
        }
    }

    /// Decompress bytes
    pub fn decompress(&self, bytes: &[u8]) -> LinkResult<Vec<u8>> {
        match self {
            CompressionCodec::None => Ok(bytes.to_vec()),
            CompressionCodec::Zstd => zstd::decode_all(bytes)
                .map_err(|e| LinkError::Compression(format!("zstd decompression failed: {}", e))),
            CompressionCodec::Brotli => {
                let mut out = Vec::new();
                let mut reader = bytes;
                brotli::BrotliDecompress(&mut reader, &mut out).map_err(|e| {
                    LinkError::Compression(format!("brotli decompression failed: {}", e))
                })?;
                Ok(out)
            }
        }
    }
}

impl std::fmt::Display for CompressionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(CompressionCodec::parse("none").unwrap(), CompressionCodec::None);
        assert_eq!(CompressionCodec::parse("identity").unwrap(), CompressionCodec::None);
        assert_eq!(CompressionCodec::parse("br").unwrap(), CompressionCodec::Brotli);
        assert_eq!(CompressionCodec::parse("zstd").unwrap(), CompressionCodec::Zstd);
    }

    #[test]
    fn test_parse_unknown_is_integrity_failure() {
        for name in ["gzip", "ZSTD", "", "lz4"] {
            let err = CompressionCodec::parse(name).unwrap_err();
            assert!(matches!(err, LinkError::DocumentIntegrity(_)), "{}", name);
        }
    }

    #[test]
    fn test_each_codec_restores_input() {
        let input = br#"{"displayName":"Alice","bio":"aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"}"#;
        for codec in CompressionCodec::ALL {
            let compressed = codec.compress(input).unwrap();
            assert_eq!(codec.decompress(&compressed).unwrap(), input, "{}", codec);
        }
    }

    #[test]
    fn test_compression_shrinks_repetitive_input() {
        let input = vec![b'a'; 10_000];
        assert!(CompressionCodec::Zstd.compress(&input).unwrap().len() < 1000);
        assert!(CompressionCodec::Brotli.compress(&input).unwrap().len() < 1000);
    }

    #[test]
    fn test_corrupt_input_fails() {
        let err = CompressionCodec::Zstd.decompress(b"not zstd").unwrap_err();
        assert!(matches!(err, LinkError::Compression(_)));
    }
}
