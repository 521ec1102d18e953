use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pow_gateway::protocol::pow;
use tokio_util::sync::CancellationToken;

fn bench_validate(c: &mut Criterion) {
    let seed = [7u8; pow::SEED_LEN];
    c.bench_function("pow_validate", |b| {
        b.iter(|| pow::validate(black_box(&seed), black_box(6), black_box("3f9a2c")))
    });
}

#[allow(clippy::unwrap_used)]
fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("pow_solve");
    group.sample_size(20);
    let seed = [7u8; pow::SEED_LEN];
    let cancel = CancellationToken::new();

    for difficulty in [1u8, 2, 3, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(difficulty),
            &difficulty,
            |b, &difficulty| b.iter(|| pow::solve(black_box(&seed), difficulty, &cancel).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_validate, bench_solve);
criterion_main!(benches);
