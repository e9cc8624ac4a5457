//! Normalizer Benchmarks — Poll-Cycle Hot Path
//!
//! Benchmarks the provider-record canonicalization that runs on every
//! transaction of every deposit poll cycle.
//!
//! Run with: cargo bench --bench normalizer_bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use chain_connector::ports::rpc_gateway::ProviderTxRecord;
use chain_connector::usecases::normalizer::normalize;

fn well_formed_record(i: usize) -> ProviderTxRecord {
    ProviderTxRecord {
        txid: Some(format!("0xhash{i:060}")),
        from: Some("0x9b1f702d1a9d066c34f6c2c1b2e6baf1a1212f6c".to_string()),
        to: Some("0x1c8aff950685c2ed4bc3174f3472287b56d95173".to_string()),
        contract_address: None,
        value: Some("250000000".to_string()),
        timestamp_ms: Some(1_700_000_000_000 + i as i64),
        confirmed: Some(true),
        memo: None,
    }
}

/// Benchmark normalizing a single well-formed record.
fn bench_normalize_single(c: &mut Criterion) {
    let record = well_formed_record(0);

    c.bench_function("normalize_single_record", |b| {
        b.iter(|| normalize(black_box(&record), black_box(8)));
    });
}

/// Benchmark normalizing a full provider page (default page size).
fn bench_normalize_page(c: &mut Criterion) {
    let page: Vec<ProviderTxRecord> = (0..20).map(well_formed_record).collect();

    c.bench_function("normalize_page_of_20", |b| {
        b.iter(|| {
            for record in &page {
                let _tx = normalize(black_box(record), black_box(8));
            }
        });
    });
}

/// Benchmark the degraded path: every field missing or malformed.
fn bench_normalize_malformed(c: &mut Criterion) {
    let record = ProviderTxRecord {
        value: Some("not-a-number".to_string()),
        timestamp_ms: Some(i64::MAX),
        ..ProviderTxRecord::default()
    };

    c.bench_function("normalize_malformed_record", |b| {
        b.iter(|| normalize(black_box(&record), black_box(8)));
    });
}

criterion_group!(
    benches,
    bench_normalize_single,
    bench_normalize_page,
    bench_normalize_malformed
);
criterion_main!(benches);
