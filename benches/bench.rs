//! Criterion benchmarks for colstore.
//!
//! Covers the hot path of a query:
//! - Posting-list decoding
//! - Intersect and subtract merges
//! - Score filtering and ranking

use std::hint::black_box;

use criterion::{BatchSize, Criterion, Throughput, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use colstore::codec::{decode_offset_scores, encode_offset_scores};
use colstore::query::{OffsetScore, PostingList, ScoreOperator};

/// Generate a posting list with roughly `density` of the offsets in `0..span`.
fn generate_postings(rng: &mut StdRng, span: u64, density: f64) -> PostingList {
    let mut entries = Vec::new();
    for offset in 0..span {
        if rng.random_bool(density) {
            entries.push(OffsetScore::new(offset * 64, rng.random_range(0.0..1.0)));
        }
    }
    PostingList::from_sorted(entries)
}

fn bench_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("offset_score_codec");
    let mut rng = StdRng::seed_from_u64(42);
    let postings = generate_postings(&mut rng, 100_000, 0.5);
    let encoded = encode_offset_scores(postings.as_slice()).unwrap();

    group.throughput(Throughput::Elements(postings.len() as u64));
    group.bench_function("decode", |b| {
        b.iter(|| decode_offset_scores(black_box(&encoded)).unwrap())
    });
    group.bench_function("encode", |b| {
        b.iter(|| encode_offset_scores(black_box(postings.as_slice())).unwrap())
    });

    group.finish();
}

fn bench_merges(c: &mut Criterion) {
    let mut group = c.benchmark_group("posting_merges");
    let mut rng = StdRng::seed_from_u64(7);
    let left = generate_postings(&mut rng, 100_000, 0.5);
    let right = generate_postings(&mut rng, 100_000, 0.2);

    group.throughput(Throughput::Elements((left.len() + right.len()) as u64));
    group.bench_function("intersect", |b| {
        b.iter_batched(
            || left.clone(),
            |mut list| list.intersect(black_box(&right)),
            BatchSize::LargeInput,
        )
    });
    group.bench_function("subtract", |b| {
        b.iter_batched(
            || left.clone(),
            |mut list| list.subtract(black_box(&right)),
            BatchSize::LargeInput,
        )
    });
    group.bench_function("retain_by_score", |b| {
        b.iter_batched(
            || left.clone(),
            |mut list| list.retain_by_score(ScoreOperator::Greater, black_box(0.5)),
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn bench_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("ranking");
    group.sample_size(20);

    for size in [1_000u64, 100_000] {
        let mut rng = StdRng::seed_from_u64(size);
        let list = generate_postings(&mut rng, size, 1.0);

        group.throughput(Throughput::Elements(list.len() as u64));
        group.bench_function(format!("sort_by_score_desc_{size}"), |b| {
            b.iter_batched(
                || list.clone(),
                |mut list| {
                    list.sort_by_score_desc();
                    list
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_codec, bench_merges, bench_ranking);
criterion_main!(benches);
