//! Integration tests for document storage on the ledger
//!
//! Stores documents with [`DocumentCodec::store`] and reads them back with
//! [`DocumentCodec::fetch`], including channels written by hand to cover
//! manifests this crate would never produce.

use ledgerlink_core::codec::{to_data_uri, ChunkRecord, DocumentCodec};
use ledgerlink_core::ledger::{LedgerClient, SubmitPolicy};
use ledgerlink_core::{
    AccountSigner, ChannelId, CompressionCodec, IdentityDocument, InMemoryLedger, LedgerSigner,
    LinkError, ProfileType, Uaid,
};

fn sample_document(owner: &AccountSigner) -> IdentityDocument {
    IdentityDocument {
        schema_version: IdentityDocument::current_schema_version(),
        profile_type: ProfileType::Personal,
        display_name: "Dana".to_string(),
        alias: Some("dana".to_string()),
        bio: Some("Long biography. ".repeat(120)),
        avatar_reference: Some("hcs://1/0.0.777".to_string()),
        inbound_channel_id: ChannelId::new("0.0.2001"),
        outbound_channel_id: ChannelId::new("0.0.2002"),
        owner_account_id: owner.account_id().clone(),
        uaid: Uaid::derive("testnet", owner.account_id(), Some("dana")).to_string(),
        extension_properties: Default::default(),
    }
}

/// Write a document channel by hand with an arbitrary memo
async fn store_raw(
    ledger: &InMemoryLedger,
    signer: &AccountSigner,
    memo: &str,
    body: &[u8],
) -> ChannelId {
    let channel_id = ledger
        .create_channel(memo, SubmitPolicy::Single(signer.public_key()), signer)
        .await
        .unwrap();
    let data_uri = to_data_uri("application/json", body);
    for chunk in ChunkRecord::split(&data_uri, 64) {
        ledger
            .submit_message(&channel_id, chunk.to_json().unwrap().as_bytes(), signer)
            .await
            .unwrap();
    }
    channel_id
}

#[tokio::test]
async fn test_store_and_fetch_each_codec() {
    let ledger = InMemoryLedger::new();
    let owner = ledger.create_account();
    let document = sample_document(&owner);
    let codec = DocumentCodec::new(128);

    for compression in CompressionCodec::ALL {
        let stored = codec
            .store(&*ledger, &owner, &document, compression)
            .await
            .unwrap();
        assert!(stored.chunk_count > 1);
        assert_eq!(ledger.record_count(&stored.channel_id), stored.chunk_count);
        assert_eq!(stored.reference.channel_id, stored.channel_id);

        let decoded = codec.fetch(&*ledger, &stored.channel_id).await.unwrap();
        assert!(decoded.checksum_valid);
        assert_eq!(decoded.mime_type, "application/json");
        assert_eq!(decoded.manifest.codec, compression);
        assert_eq!(decoded.document, document);
    }
}

#[tokio::test]
async fn test_compression_shrinks_repetitive_documents() {
    let ledger = InMemoryLedger::new();
    let owner = ledger.create_account();
    let document = sample_document(&owner);
    let codec = DocumentCodec::default();

    let plain = codec.encode(&document, CompressionCodec::None).unwrap();
    for compression in [CompressionCodec::Zstd, CompressionCodec::Brotli] {
        let packed = codec.encode(&document, compression).unwrap();
        assert!(packed.data_uri.len() < plain.data_uri.len());
        assert_eq!(packed.manifest.content_hash, plain.manifest.content_hash);
    }
}

#[tokio::test]
async fn test_document_channel_rejects_other_writers() {
    let ledger = InMemoryLedger::new();
    let owner = ledger.create_account();
    let intruder = ledger.create_account();

    let stored = DocumentCodec::default()
        .store(&*ledger, &owner, &sample_document(&owner), CompressionCodec::Zstd)
        .await
        .unwrap();

    let err = ledger
        .submit_message(&stored.channel_id, b"{\"offset\":0,\"payload\":\"x\"}", &intruder)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::SignatureInvalid(_)));
}

#[tokio::test]
async fn test_unsupported_codec_is_integrity_failure() {
    let ledger = InMemoryLedger::new();
    let owner = ledger.create_account();
    let body = sample_document(&owner).to_bytes().unwrap();
    let hash = ledgerlink_core::codec::content_hash(&body);

    let channel_id = store_raw(&ledger, &owner, &format!("{}:gzip:base64", hash), &body).await;

    let err = DocumentCodec::default()
        .fetch(&*ledger, &channel_id)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::DocumentIntegrity(ref msg) if msg.contains("gzip")));
}

#[tokio::test]
async fn test_hash_mismatch_still_returns_document() {
    let ledger = InMemoryLedger::new();
    let owner = ledger.create_account();
    let document = sample_document(&owner);
    let body = document.to_bytes().unwrap();

    let memo = format!("{}:none:base64", "0".repeat(64));
    let channel_id = store_raw(&ledger, &owner, &memo, &body).await;

    let decoded = DocumentCodec::default()
        .fetch(&*ledger, &channel_id)
        .await
        .unwrap();
    assert!(!decoded.checksum_valid);
    assert_eq!(decoded.document, document);
}

#[tokio::test]
async fn test_uppercase_hash_matches() {
    let ledger = InMemoryLedger::new();
    let owner = ledger.create_account();
    let body = sample_document(&owner).to_bytes().unwrap();
    let hash = ledgerlink_core::codec::content_hash(&body).to_uppercase();

    let channel_id = store_raw(&ledger, &owner, &format!("{}:identity:base64", hash), &body).await;

    let decoded = DocumentCodec::default()
        .fetch(&*ledger, &channel_id)
        .await
        .unwrap();
    assert!(decoded.checksum_valid);
}

#[tokio::test]
async fn test_chunk_failure_propagates() {
    let ledger = InMemoryLedger::new();
    let owner = ledger.create_account();

    // Accounts and channels share one counter: the owner is 0.0.1001
    let next = ChannelId::new("0.0.1002");
    ledger.fail_next_submit_to(&next);

    let err = DocumentCodec::default()
        .store(&*ledger, &owner, &sample_document(&owner), CompressionCodec::None)
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::Ledger(_)));
}

#[tokio::test]
async fn test_channel_creation_failure_names_document_purpose() {
    let ledger = InMemoryLedger::new();
    let owner = ledger.create_account();
    ledger.fail_next_channel_creations(1);

    let err = DocumentCodec::default()
        .store(&*ledger, &owner, &sample_document(&owner), CompressionCodec::None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LinkError::ChannelResolution { ref purpose, .. } if purpose == "document"
    ));
}

#[tokio::test]
async fn test_fetch_missing_channel() {
    let ledger = InMemoryLedger::new();
    let err = DocumentCodec::default()
        .fetch(&*ledger, &ChannelId::new("0.0.31337"))
        .await
        .unwrap_err();
    assert!(matches!(err, LinkError::ChannelNotFound(_)));
}

#[tokio::test]
async fn test_fetch_minimal_document_from_other_writer() {
    let ledger = InMemoryLedger::new();
    let owner = ledger.create_account();
    let body = br#"{"schemaVersion":"1.0","type":0,"displayName":"Carol","uaid":"u"}"#;
    let hash = ledgerlink_core::codec::content_hash(body);

    let channel_id = store_raw(&ledger, &owner, &format!("{}:none:base64", hash), body).await;

    let decoded = DocumentCodec::default()
        .fetch(&*ledger, &channel_id)
        .await
        .unwrap();
    assert!(decoded.checksum_valid);
    assert_eq!(decoded.document.display_name, "Carol");
    assert_eq!(decoded.document.profile_type, ProfileType::Personal);
    assert!(decoded.document.inbound_channel_id.is_blank());
    assert!(decoded.document.owner_account_id.is_blank());
}

#[tokio::test]
async fn test_fetch_document_with_unknown_kind() {
    let ledger = InMemoryLedger::new();
    let owner = ledger.create_account();
    let body = br#"{"schemaVersion":"1.0","type":2,"displayName":"Relay","uaid":"u","tags":["x"]}"#;
    let hash = ledgerlink_core::codec::content_hash(body);

    let channel_id = store_raw(&ledger, &owner, &format!("{}:none:base64", hash), body).await;

    let decoded = DocumentCodec::default()
        .fetch(&*ledger, &channel_id)
        .await
        .unwrap();
    assert_eq!(decoded.document.profile_type, ProfileType::Other(2));
}
