//! Protocol constants
//!
//! Size ceilings here are imposed by the ledger (memo fields, account
//! metadata) or by the messaging standard (request notes). Everything that
//! truncates or validates against one of these limits goes through this
//! module.

/// Tag prefixing every channel memo and message envelope of the messaging protocol
pub const PROTOCOL_TAG: &str = "hcs-10";

/// Tag prefixing the actor metadata pointer to an identity document
pub const DOCUMENT_PROTOCOL_TAG: &str = "hcs-11";

/// Scheme of document reference strings (`hcs://1/<channelId>`)
pub const REFERENCE_SCHEME: &str = "hcs";

/// Version segment of document reference strings
pub const REFERENCE_VERSION: u32 = 1;

/// `standard` field of discovery-registry announcements
pub const REGISTRY_STANDARD: &str = "hcs-10";

/// `version` field of discovery-registry announcements
pub const REGISTRY_VERSION: &str = "1.0";

/// Schema version written into every identity document
pub const DOCUMENT_SCHEMA_VERSION: &str = "1.0";

/// Mime type of an encoded identity document
pub const DOCUMENT_MIME_TYPE: &str = "application/json";

/// Encoding named in every storage manifest
pub const MANIFEST_ENCODING: &str = "base64";

/// Maximum length in bytes of a channel memo
pub const MAX_MEMO_BYTES: usize = 100;

/// Maximum length in bytes of the actor metadata pointer value
pub const MAX_POINTER_BYTES: usize = 99;

/// Maximum length in characters of a connection request note
pub const MAX_NOTE_CHARS: usize = 280;

/// Default channel time-to-live advertised in channel memos
pub const DEFAULT_TTL_SECONDS: u32 = 60;

/// Default size in characters of one document chunk payload
pub const DEFAULT_FRAGMENT_SIZE: usize = 1024;

/// Default number of reads performed by the mirror confirmation poller
pub const DEFAULT_CONFIRM_ATTEMPTS: u32 = 5;

/// Default delay between mirror confirmation reads
pub const DEFAULT_CONFIRM_DELAY_MS: u64 = 1000;

/// Default number of entries an inbox keeps before evicting the oldest
pub const DEFAULT_INBOX_CAPACITY: usize = 500;

/// Truncate a string to at most `max_bytes` bytes without splitting a character
pub fn truncate_utf8(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Truncate a string to at most `max_chars` characters
pub fn truncate_chars(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((end, _)) => &value[..end],
        None => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_utf8_short_value_untouched() {
        assert_eq!(truncate_utf8("hcs-11:hcs://1/0.0.5", MAX_POINTER_BYTES), "hcs-11:hcs://1/0.0.5");
    }

    #[test]
    fn test_truncate_utf8_respects_char_boundary() {
        // 'é' is two bytes; cutting at 2 would split it
        let value = "aé";
        assert_eq!(truncate_utf8(value, 2), "a");
        assert_eq!(truncate_utf8(value, 3), "aé");
    }

    #[test]
    fn test_truncate_utf8_exact_ceiling() {
        let value = "x".repeat(150);
        assert_eq!(truncate_utf8(&value, MAX_POINTER_BYTES).len(), 99);
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        let note = "é".repeat(300);
        let truncated = truncate_chars(&note, MAX_NOTE_CHARS);
        assert_eq!(truncated.chars().count(), 280);
        assert_eq!(truncated.len(), 560);
        assert_eq!(truncate_chars("short", MAX_NOTE_CHARS), "short");
    }
}
