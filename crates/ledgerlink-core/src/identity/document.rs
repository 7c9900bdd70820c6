//! Identity document published by an actor
//!
//! The document is immutable once stored: publishing a new version stores a
//! new document and swaps the actor's pointer, it never edits the old one.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::DOCUMENT_SCHEMA_VERSION;
use crate::error::{LinkError, LinkResult};
use crate::types::{AccountId, ChannelId};

/// Kind of actor described by a document (serialized as a number)
///
/// Kinds this crate does not know are kept as [`ProfileType::Other`] so a
/// document written by a newer client still decodes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u64", from = "u64")]
pub enum ProfileType {
    /// A person
    #[default]
    Personal,
    /// An autonomous agent
    Agent,
    /// Any other numeric kind
    Other(u64),
}

impl From<ProfileType> for u64 {
    fn from(value: ProfileType) -> Self {
        match value {
            ProfileType::Personal => 0,
            ProfileType::Agent => 1,
            ProfileType::Other(kind) => kind,
        }
    }
}

impl From<u64> for ProfileType {
    fn from(value: u64) -> Self {
        match value {
            0 => ProfileType::Personal,
            1 => ProfileType::Agent,
            other => ProfileType::Other(other),
        }
    }
}

/// Versioned identity record stored on a document channel
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDocument {
    /// Document schema version
    pub schema_version: String,
    /// Numeric actor kind
    #[serde(rename = "type")]
    pub profile_type: ProfileType,
    /// Name shown to other actors
    pub display_name: String,
    /// Short handle, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Free-form biography
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    /// Reference to an avatar image (URI or ledger reference)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_reference: Option<String>,
    /// Channel other actors send connection requests to (blank if the actor has none)
    #[serde(default, skip_serializing_if = "ChannelId::is_blank")]
    pub inbound_channel_id: ChannelId,
    /// Channel recording this actor's own handshake history (blank if none)
    #[serde(default, skip_serializing_if = "ChannelId::is_blank")]
    pub outbound_channel_id: ChannelId,
    /// Account that owns the document (blank if the writer left it out)
    #[serde(default, skip_serializing_if = "AccountId::is_blank")]
    pub owner_account_id: AccountId,
    /// Portable actor identifier
    pub uaid: String,
    /// Open-ended extension data
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extension_properties: Map<String, Value>,
}

impl IdentityDocument {
    /// Serialize to the canonical JSON bytes that get hashed and stored
    pub fn to_bytes(&self) -> LinkResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse document JSON, requiring the minimal identity shape
    ///
    /// A document must carry `schemaVersion`, a numeric `type`,
    /// `displayName`, and a `uaid` string; anything less is rejected as a
    /// [`LinkError::DocumentIntegrity`] failure. Every other field is
    /// optional, and unknown fields are ignored.
    pub fn from_json(text: &str) -> LinkResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| LinkError::DocumentIntegrity(format!("Document is not JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| LinkError::DocumentIntegrity("Document is not an object".to_string()))?;

        let has_string = |key: &str| object.get(key).map(Value::is_string).unwrap_or(false);
        if !has_string("schemaVersion") {
            return Err(LinkError::DocumentIntegrity("Missing schemaVersion".to_string()));
        }
        if !object.get("type").map(Value::is_u64).unwrap_or(false) {
            return Err(LinkError::DocumentIntegrity("Missing numeric type".to_string()));
        }
        if !has_string("displayName") {
            return Err(LinkError::DocumentIntegrity("Missing displayName".to_string()));
        }
        if !has_string("uaid") {
            return Err(LinkError::DocumentIntegrity("Missing identity string".to_string()));
        }

        serde_json::from_value(value)
            .map_err(|e| LinkError::DocumentIntegrity(format!("Malformed document: {}", e)))
    }

    /// Current schema version
    pub fn current_schema_version() -> String {
        DOCUMENT_SCHEMA_VERSION.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> IdentityDocument {
        IdentityDocument {
            schema_version: "1.0".to_string(),
            profile_type: ProfileType::Personal,
            display_name: "Alice".to_string(),
            alias: Some("alice".to_string()),
            bio: None,
            avatar_reference: None,
            inbound_channel_id: ChannelId::new("0.0.10"),
            outbound_channel_id: ChannelId::new("0.0.11"),
            owner_account_id: AccountId::new("0.0.2"),
            uaid: "uaid:did:zabc;uid=alice;proto=hcs-10;nativeId=hedera:testnet:0.0.2".to_string(),
            extension_properties: Map::new(),
        }
    }

    #[test]
    fn test_document_json_shape() {
        let json: Value = serde_json::from_slice(&sample().to_bytes().unwrap()).unwrap();
        assert_eq!(json["schemaVersion"], "1.0");
        assert_eq!(json["type"], 0);
        assert_eq!(json["displayName"], "Alice");
        assert_eq!(json["inboundChannelId"], "0.0.10");
        assert!(json.get("bio").is_none());
        assert!(json.get("extensionProperties").is_none());
    }

    #[test]
    fn test_document_parse_roundtrip() {
        let doc = sample();
        let bytes = doc.to_bytes().unwrap();
        let parsed = IdentityDocument::from_json(std::str::from_utf8(&bytes).unwrap()).unwrap();
        assert_eq!(parsed, doc);
        assert_eq!(parsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_document_requires_minimal_fields() {
        let err = IdentityDocument::from_json(r#"{"type":0,"displayName":"A","uaid":"x"}"#).unwrap_err();
        assert!(matches!(err, LinkError::DocumentIntegrity(_)));

        let err = IdentityDocument::from_json(r#"{"schemaVersion":"1.0","type":"0","displayName":"A","uaid":"x"}"#)
            .unwrap_err();
        assert!(matches!(err, LinkError::DocumentIntegrity(_)));

        let err = IdentityDocument::from_json(r#"{"schemaVersion":"1.0","type":0,"uaid":"x"}"#).unwrap_err();
        assert!(matches!(err, LinkError::DocumentIntegrity(_)));

        let err = IdentityDocument::from_json("[]").unwrap_err();
        assert!(matches!(err, LinkError::DocumentIntegrity(_)));
    }

    #[test]
    fn test_profile_type_numeric() {
        assert_eq!(serde_json::to_string(&ProfileType::Agent).unwrap(), "1");
        assert_eq!(
            serde_json::from_str::<ProfileType>("7").unwrap(),
            ProfileType::Other(7)
        );
        assert_eq!(serde_json::to_string(&ProfileType::Other(7)).unwrap(), "7");
        assert!(serde_json::from_str::<ProfileType>("-1").is_err());
    }

    #[test]
    fn test_minimal_foreign_document_parses() {
        let text = r#"{"schemaVersion":"1.0","type":0,"displayName":"Carol","uaid":"u"}"#;
        let doc = IdentityDocument::from_json(text).unwrap();
        assert_eq!(doc.display_name, "Carol");
        assert_eq!(doc.profile_type, ProfileType::Personal);
        assert!(doc.inbound_channel_id.is_blank());
        assert!(doc.outbound_channel_id.is_blank());
        assert!(doc.owner_account_id.is_blank());

        // Blank ids stay off the wire
        let json: Value = serde_json::from_slice(&doc.to_bytes().unwrap()).unwrap();
        assert!(json.get("inboundChannelId").is_none());
        assert!(json.get("ownerAccountId").is_none());
    }

    #[test]
    fn test_unknown_kind_and_fields_tolerated() {
        let text = r#"{"schemaVersion":"2.1","type":2,"displayName":"Relay","uaid":"u",
            "inboundChannelId":"0.0.40","socials":[{"platform":"x"}]}"#;
        let doc = IdentityDocument::from_json(text).unwrap();
        assert_eq!(doc.profile_type, ProfileType::Other(2));
        assert_eq!(doc.inbound_channel_id, ChannelId::new("0.0.40"));
        assert_eq!(doc.schema_version, "2.1");
    }
}
