use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use serde_json::json;

use ami_infra::jobs::{InMemoryJobStore, Job, JobExecutor, JobRegistry, JobStore};

const QUEUE: &str = "bench";

fn registry() -> JobRegistry {
    let mut registry = JobRegistry::new();
    registry.register(QUEUE, "noop", |ctx| Ok(ctx.job().payload.clone()));
    registry
}

fn bench_enqueue_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("enqueue_throughput");

    for batch_size in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), batch_size, |b, &n| {
            b.iter(|| {
                let store = InMemoryJobStore::new();
                for i in 0..n {
                    store.enqueue(Job::new(QUEUE, "noop", json!({ "i": i }))).unwrap();
                }
                black_box(store.stats(QUEUE).unwrap());
            });
        });
    }

    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_queue");

    for batch_size in [10usize, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), batch_size, |b, &n| {
            b.iter(|| {
                let store = InMemoryJobStore::new();
                for i in 0..n {
                    store.enqueue(Job::new(QUEUE, "noop", json!({ "i": i }))).unwrap();
                }
                let executor = JobExecutor::new(store, registry());
                black_box(executor.drain(QUEUE).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_enqueue_throughput, bench_drain);
criterion_main!(benches);
