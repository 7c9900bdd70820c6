//! Property-based tests for identifiers, limits, and the document codec
//!
//! Uses proptest to check invariants that must hold for any input, not just
//! the handful of examples in the unit tests.

use chrono::{TimeZone, Utc};
use ledgerlink_core::codec::DocumentCodec;
use ledgerlink_core::connect::OperatorId;
use ledgerlink_core::constants::{truncate_chars, truncate_utf8, MAX_POINTER_BYTES};
use ledgerlink_core::identity::normalize_alias;
use ledgerlink_core::ledger::encode_payload;
use ledgerlink_core::{
    AccountId, ChannelId, CompressionCodec, DocumentReference, IdentityDocument, LedgerRecord,
    ProfileType, Uaid,
};
use proptest::prelude::*;

// ============================================================================
// Strategy Generators
// ============================================================================

/// Ledger entity ids in shard.realm.num form
fn entity_id_strategy() -> impl Strategy<Value = String> {
    (0u32..3, 0u32..3, 1u64..10_000_000).prop_map(|(s, r, n)| format!("{}.{}.{}", s, r, n))
}

fn network_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("mainnet".to_string()),
        Just("testnet".to_string()),
        Just("previewnet".to_string()),
    ]
}

fn codec_strategy() -> impl Strategy<Value = CompressionCodec> {
    prop_oneof![
        Just(CompressionCodec::None),
        Just(CompressionCodec::Zstd),
        Just(CompressionCodec::Brotli),
    ]
}

fn document_strategy() -> impl Strategy<Value = IdentityDocument> {
    (
        entity_id_strategy(),
        ".{1,40}",
        proptest::option::of(".{0,600}"),
        proptest::option::of("[a-zA-Z0-9 _-]{1,20}"),
    )
        .prop_map(|(account, display_name, bio, alias)| {
            let owner = AccountId::new(account);
            IdentityDocument {
                schema_version: IdentityDocument::current_schema_version(),
                profile_type: ProfileType::Personal,
                uaid: Uaid::derive("testnet", &owner, alias.as_deref()).to_string(),
                display_name,
                alias,
                bio,
                avatar_reference: None,
                inbound_channel_id: ChannelId::new("0.0.10"),
                outbound_channel_id: ChannelId::new("0.0.11"),
                owner_account_id: owner,
                extension_properties: Default::default(),
            }
        })
}

fn records_for(channel: &ChannelId, payloads: Vec<String>) -> Vec<LedgerRecord> {
    payloads
        .into_iter()
        .enumerate()
        .map(|(i, payload)| LedgerRecord {
            channel_id: channel.clone(),
            sequence_number: i as u64 + 1,
            consensus_timestamp: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
            payer_account_id: AccountId::new("0.0.1"),
            message: encode_payload(payload.as_bytes()),
        })
        .collect()
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// Same inputs, same identifier; the account is recoverable from it
    #[test]
    fn prop_uaid_deterministic_and_recoverable(
        network in network_strategy(),
        account in entity_id_strategy(),
        alias in proptest::option::of(".{0,30}"),
    ) {
        let account = AccountId::new(account);
        let first = Uaid::derive(&network, &account, alias.as_deref());
        let second = Uaid::derive(&network, &account, alias.as_deref());
        prop_assert_eq!(&first, &second);

        let (parsed_network, parsed_account) = first.native_parts().unwrap();
        prop_assert_eq!(parsed_network, network.clone());
        prop_assert_eq!(parsed_account, account.clone());
        prop_assert_eq!(first.native_id(), format!("hedera:{}:{}", network, account));

        prop_assert!(!first.uid().is_empty());
        prop_assert_eq!(Uaid::parse(first.as_str()).unwrap(), first);
    }

    /// Normalized aliases only use the allowed alphabet and are stable
    #[test]
    fn prop_normalize_alias_alphabet(alias in ".{0,60}") {
        let normalized = normalize_alias(&alias);
        prop_assert!(normalized
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'));
        prop_assert!(!normalized.starts_with('-') && !normalized.ends_with('-'));
        prop_assert_eq!(normalize_alias(&normalized), normalized);
    }

    /// Truncation never exceeds its limit and always yields a prefix
    #[test]
    fn prop_truncation_limits(value in ".{0,200}", limit in 0usize..150) {
        let bytes = truncate_utf8(&value, limit);
        prop_assert!(bytes.len() <= limit);
        prop_assert!(value.starts_with(bytes));

        let chars = truncate_chars(&value, limit);
        prop_assert!(chars.chars().count() <= limit);
        prop_assert!(value.starts_with(chars));
        if value.chars().count() <= limit {
            prop_assert_eq!(chars, value.as_str());
        }
    }

    /// Pointer values fit the account memo whatever the channel id
    #[test]
    fn prop_pointer_value_fits(channel in "[0-9.]{1,150}") {
        let reference = DocumentReference::new(ChannelId::new(channel));
        prop_assert!(reference.pointer_value().len() <= MAX_POINTER_BYTES);
        prop_assert!(reference.pointer_value().starts_with("hcs-11:hcs://1/"));
    }

    /// Operator ids survive formatting
    #[test]
    fn prop_operator_id_display_parse(
        channel in entity_id_strategy(),
        account in entity_id_strategy(),
    ) {
        let operator = OperatorId::new(ChannelId::new(channel), AccountId::new(account));
        prop_assert_eq!(OperatorId::parse(&operator.to_string()), Some(operator));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Documents decode from chunks in any arrival order, with foreign records mixed in
    #[test]
    fn prop_codec_any_arrival_order(
        document in document_strategy(),
        codec in codec_strategy(),
        fragment_size in 16usize..512,
        seed in any::<u64>(),
    ) {
        let encoder = DocumentCodec::new(fragment_size);
        let encoded = encoder.encode(&document, codec).unwrap();

        let mut payloads: Vec<String> = encoded
            .chunks
            .iter()
            .map(|chunk| chunk.to_json().unwrap())
            .collect();
        payloads.push("{\"p\":\"hcs-10\",\"op\":\"message\"}".to_string());
        payloads.push("not json".to_string());

        // Deterministic shuffle from the seed
        let mut state = seed | 1;
        for i in (1..payloads.len()).rev() {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            payloads.swap(i, (state % (i as u64 + 1)) as usize);
        }

        let channel = ChannelId::new("0.0.500");
        let records = records_for(&channel, payloads);
        let decoded = encoder
            .decode_records(&encoded.manifest.to_memo(), &records)
            .unwrap();

        prop_assert!(decoded.checksum_valid);
        prop_assert_eq!(decoded.document, document);
    }
}
