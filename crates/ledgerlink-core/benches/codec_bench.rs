//! Benchmarks for ledgerlink document and inbox operations
//!
//! Run with: cargo bench -p ledgerlink-core
//!
//! These benchmarks establish performance baselines for:
//! - Document encoding per compression codec
//! - Decoding from shuffled chunk records
//! - Inbox ingestion with duplicate delivery

use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ledgerlink_core::codec::DocumentCodec;
use ledgerlink_core::ledger::encode_payload;
use ledgerlink_core::{
    AccountId, ChannelId, CompressionCodec, IdentityDocument, Inbox, LedgerRecord, ProfileType,
    Uaid,
};

fn document(bio_len: usize) -> IdentityDocument {
    let owner = AccountId::new("0.0.4242");
    IdentityDocument {
        schema_version: IdentityDocument::current_schema_version(),
        profile_type: ProfileType::Agent,
        display_name: "Benchmark Agent".to_string(),
        alias: Some("bench".to_string()),
        bio: Some("lorem ipsum dolor sit amet ".repeat(bio_len / 27 + 1)),
        avatar_reference: None,
        inbound_channel_id: ChannelId::new("0.0.5001"),
        outbound_channel_id: ChannelId::new("0.0.5002"),
        uaid: Uaid::derive("testnet", &owner, Some("bench")).to_string(),
        owner_account_id: owner,
        extension_properties: Default::default(),
    }
}

fn record(channel: &ChannelId, sequence: u64, payload: &[u8]) -> LedgerRecord {
    LedgerRecord {
        channel_id: channel.clone(),
        sequence_number: sequence,
        consensus_timestamp: Utc
            .timestamp_opt(1_700_000_000 + sequence as i64, 0)
            .unwrap(),
        payer_account_id: AccountId::new("0.0.1"),
        message: encode_payload(payload),
    }
}

// ============================================================================
// Encoding Benchmarks
// ============================================================================

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_document");
    let codec = DocumentCodec::default();

    for size in [1_000usize, 16_000] {
        let doc = document(size);
        group.throughput(Throughput::Bytes(size as u64));
        for compression in CompressionCodec::ALL {
            group.bench_with_input(
                BenchmarkId::new(compression.as_str(), size),
                &doc,
                |b, doc| b.iter(|| black_box(codec.encode(doc, compression).unwrap())),
            );
        }
    }

    group.finish();
}

// ============================================================================
// Decoding Benchmarks
// ============================================================================

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_document");
    let codec = DocumentCodec::new(256);
    let channel = ChannelId::new("0.0.6000");

    for compression in CompressionCodec::ALL {
        let encoded = codec.encode(&document(16_000), compression).unwrap();
        let memo = encoded.manifest.to_memo();
        // Reverse arrival order forces the offset sort
        let records: Vec<LedgerRecord> = encoded
            .chunks
            .iter()
            .rev()
            .enumerate()
            .map(|(i, chunk)| record(&channel, i as u64 + 1, chunk.to_json().unwrap().as_bytes()))
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(compression.as_str()),
            &records,
            |b, records| b.iter(|| black_box(codec.decode_records(&memo, records).unwrap())),
        );
    }

    group.finish();
}

// ============================================================================
// Inbox Benchmarks
// ============================================================================

fn bench_inbox_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("inbox_ingest");
    let channel = ChannelId::new("0.0.7000");

    for count in [100u64, 1_000] {
        let records: Vec<LedgerRecord> = (1..=count)
            .map(|seq| {
                let body = format!(
                    r#"{{"p":"hcs-10","op":"message","operator_id":"0.0.7000@0.0.1","data":"msg {}"}}"#,
                    seq
                );
                record(&channel, seq, body.as_bytes())
            })
            .collect();

        group.throughput(Throughput::Elements(count * 2));
        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| {
                let inbox = Inbox::new(500);
                // History followed by a full live replay
                inbox.ingest_all(records);
                inbox.ingest_all(records);
                black_box(inbox.len())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_inbox_ingest);
criterion_main!(benches);
