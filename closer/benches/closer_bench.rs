//! Benchmarks for closer invocation.

use closer::{AggregateCloser, CancellationToken};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn build(actions: usize, failing_every: Option<usize>) -> AggregateCloser {
    let mut closer = AggregateCloser::new();
    for i in 0..actions {
        if failing_every.is_some_and(|n| i % n == 0) {
            closer.register(|| Err("bench failure".into()));
        } else if i % 2 == 0 {
            closer.register_context(|token| Ok(token.check()?));
        } else {
            closer.register(|| Ok(()));
        }
    }
    closer
}

fn closer_benchmark(c: &mut Criterion) {
    let token = CancellationToken::new();

    let mut clean = build(1_000, None);
    c.bench_function("invoke_1000_ok", |b| {
        b.iter(|| black_box(clean.invoke(&token)).is_ok())
    });

    let mut noisy = build(1_000, Some(10));
    c.bench_function("invoke_1000_with_failures", |b| {
        b.iter(|| black_box(noisy.invoke(&token)).is_err())
    });
}

criterion_group!(benches, closer_benchmark);
criterion_main!(benches);
