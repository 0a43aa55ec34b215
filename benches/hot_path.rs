use chrono::{Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use shortlink::counter_store::token_bucket_step;
use shortlink::models::LinkSnapshot;
use shortlink::services::link_policy::evaluate;

fn policy_benchmark(c: &mut Criterion) {
    let now = Utc::now();
    let snapshot = LinkSnapshot {
        code: "abc1234".to_string(),
        long_url: "https://example.com".to_string(),
        is_active: true,
        expires_at: Some(now + Duration::hours(1)),
        max_clicks: Some(1_000),
        click_count: 500,
    };

    c.bench_function("policy_evaluate", |b| {
        b.iter(|| evaluate(black_box(&snapshot), black_box(742), black_box(now)))
    });
}

fn token_bucket_benchmark(c: &mut Criterion) {
    c.bench_function("token_bucket_step", |b| {
        b.iter(|| {
            token_bucket_step(
                black_box(Some(12.5)),
                black_box(Some(1_700_000_000.0)),
                black_box(30.0),
                black_box(0.5),
                black_box(1_700_000_003.25),
                black_box(1.0),
            )
        })
    });
}

criterion_group!(benches, policy_benchmark, token_bucket_benchmark);
criterion_main!(benches);
