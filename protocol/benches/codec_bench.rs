// Wire codec and mapper benchmarks.
//
// Covers RLP encoding and strict decoding of legacy and dynamic-fee
// transactions, envelope decoding, signing hashes, and clause → operation
// mapping at various clause counts.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use primitive_types::U256;

use thor_mesh::transaction::builder::{Transaction, TransactionBuilder};
use thor_mesh::transaction::clause::Clause;
use thor_mesh::transaction::codec;
use thor_mesh::transaction::currency::TokenRegistry;
use thor_mesh::transaction::mapper::map_clauses;
use thor_mesh::transaction::mesh::MeshTransaction;
use thor_mesh::Address;

fn clauses(n: usize) -> Vec<Clause> {
    (0..n)
        .map(|i| Clause::transfer(Address::from_bytes([(i % 255) as u8 + 1; 20]), U256::exp10(18)))
        .collect()
}

fn legacy(n: usize) -> Transaction {
    TransactionBuilder::new(0x4a)
        .block_ref(0x0000_0064_1234_5678)
        .expiration(720)
        .clauses(clauses(n))
        .gas_price_coef(128)
        .gas(21_000 * n as u64)
        .nonce(0xdead_beef)
        .build()
}

fn dynamic(n: usize) -> Transaction {
    TransactionBuilder::new(0x4a)
        .block_ref(0x0000_0064_1234_5678)
        .expiration(720)
        .clauses(clauses(n))
        .dynamic_fee(U256::from(1_000_000_000u64), U256::from(20_000_000_000_000u64))
        .gas(21_000 * n as u64)
        .nonce(0xdead_beef)
        .build()
}

fn bench_encode(c: &mut Criterion) {
    let tx = legacy(1);
    c.bench_function("codec/encode_legacy", |b| {
        b.iter(|| codec::encode(&tx));
    });
    let tx = dynamic(1);
    c.bench_function("codec/encode_dynamic", |b| {
        b.iter(|| codec::encode(&tx));
    });
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/decode");
    for n in [1usize, 10, 100] {
        let raw = codec::encode(&dynamic(n));
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &raw, |b, raw| {
            b.iter(|| codec::decode(raw).unwrap());
        });
    }
    group.finish();
}

fn bench_envelope(c: &mut Criterion) {
    let mesh = MeshTransaction::new(legacy(1), Address::from_bytes([0x0a; 20]), None).unwrap();
    let bytes = mesh.encode();
    c.bench_function("envelope/decode_unsigned", |b| {
        b.iter(|| MeshTransaction::decode_unsigned(&bytes).unwrap());
    });
    c.bench_function("envelope/signing_payloads", |b| {
        b.iter(|| mesh.signing_payloads());
    });
}

fn bench_map_clauses(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let registry = TokenRegistry::new(vec![]);
    let origin = Address::from_bytes([0x0a; 20]);

    let mut group = c.benchmark_group("mapper/map_clauses");
    for n in [1usize, 10, 100] {
        let list = clauses(n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &list, |b, list| {
            b.iter(|| {
                runtime
                    .block_on(map_clauses(&registry, list.as_slice(), &origin, None, 21_000, None))
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_encode,
    bench_decode,
    bench_envelope,
    bench_map_clauses
);
criterion_main!(benches);
