use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_ndnfw_common::ndn::Name;
use rust_ndnfw_core::{FaceId, Fib};

fn fib_lookup(c: &mut Criterion) {
    let mut fib = Fib::new();
    for i in 0..1000u64 {
        let prefix = Name::from_uri(&format!("/bench/{}/{}", i % 50, i));
        fib.insert(&prefix, FaceId(i % 8), 0);
    }

    let deep = Name::from_uri("/bench/7/507/segment/3");
    let miss = Name::from_uri("/elsewhere/entirely");

    c.bench_function("fib_lpm_hit_1000", |b| {
        b.iter(|| fib.lookup(black_box(&deep)))
    });
    c.bench_function("fib_lpm_miss_1000", |b| {
        b.iter(|| fib.lookup(black_box(&miss)))
    });
}

criterion_group!(benches, fib_lookup);
criterion_main!(benches);
