use std::hint::black_box;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use ratelimit_core::spec::RateSpec;
use ratelimit_core::stores::fixed_window::FixedWindowStore;
use ratelimit_core::stores::sliding_log::SlidingLogStore;
use ratelimit_core::stores::sliding_window_counter::SlidingWindowCounterStore;
use ratelimit_core::stores::token_bucket::{TokenBucketConfig, TokenBucketStore};
use ratelimit_core::stores::LimiterStore;

fn rate() -> RateSpec {
    RateSpec::new(1_000, Duration::from_secs(60)).unwrap()
}

fn bench_token_bucket_consume(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = TokenBucketStore::with_sweep_interval(
        &rate(),
        TokenBucketConfig { capacity: 1_000.0, refill_rate: 100.0 },
        Duration::from_secs(300),
    );

    c.bench_function("token_bucket_consume", |b| {
        b.iter(|| {
            rt.block_on(async {
                let decision = store.consume(black_box("bench-client"), 1).await.unwrap();
                black_box(decision);
            })
        })
    });
}

fn bench_fixed_window_consume(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = FixedWindowStore::with_sweep_interval(rate(), Duration::from_secs(300));

    c.bench_function("fixed_window_consume", |b| {
        b.iter(|| {
            rt.block_on(async {
                let decision = store.consume(black_box("bench-client"), 1).await.unwrap();
                black_box(decision);
            })
        })
    });
}

fn bench_sliding_log_consume(c: &mut Criterion) {
    // Sliding Log is O(n) in the current log size, so its steady-state
    // cost under sustained traffic is the interesting number, not a single
    // cold call.
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = SlidingLogStore::with_sweep_interval(rate(), Duration::from_secs(300));

    c.bench_function("sliding_log_consume_steady_state", |b| {
        b.iter(|| {
            rt.block_on(async {
                let decision = store.consume(black_box("bench-client"), 1).await.unwrap();
                black_box(decision);
            })
        })
    });
}

fn bench_sliding_window_counter_consume(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = SlidingWindowCounterStore::with_sweep_interval(rate(), Duration::from_secs(300));

    c.bench_function("sliding_window_counter_consume", |b| {
        b.iter(|| {
            rt.block_on(async {
                let decision = store.consume(black_box("bench-client"), 1).await.unwrap();
                black_box(decision);
            })
        })
    });
}

fn bench_distinct_identifiers_do_not_contend(c: &mut Criterion) {
    // Each call targets a fresh identifier, so the bucket map grows but no
    // two calls ever touch the same entry; this isolates lock-acquisition
    // and hashing overhead from the per-identifier arithmetic above.
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = FixedWindowStore::with_sweep_interval(rate(), Duration::from_secs(300));
    let mut counter: u64 = 0;

    c.bench_function("fixed_window_consume_distinct_identifiers", |b| {
        b.iter(|| {
            counter += 1;
            let identifier = format!("client-{counter}");
            rt.block_on(async {
                let decision = store.consume(black_box(&identifier), 1).await.unwrap();
                black_box(decision);
            })
        })
    });
}

fn criterion_benches(c: &mut Criterion) {
    bench_token_bucket_consume(c);
    bench_fixed_window_consume(c);
    bench_sliding_log_consume(c);
    bench_sliding_window_counter_consume(c);
    bench_distinct_identifiers_do_not_contend(c);
}

criterion_group!(benches, criterion_benches);
criterion_main!(benches);
