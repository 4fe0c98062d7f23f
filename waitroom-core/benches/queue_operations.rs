use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use waitroom_core::{AdmissionEngine, MemoryQueueStore, OrderedQueueStore, SqliteQueueStore};

fn memory_engine() -> AdmissionEngine<dyn OrderedQueueStore> {
    let store: Arc<dyn OrderedQueueStore> = Arc::new(MemoryQueueStore::new());
    AdmissionEngine::new(store)
}

fn sqlite_engine(dir: &TempDir) -> AdmissionEngine<dyn OrderedQueueStore> {
    let store: Arc<dyn OrderedQueueStore> =
        Arc::new(SqliteQueueStore::open(dir.path().join("bench.db"), 8).unwrap());
    AdmissionEngine::new(store)
}

fn bench_register(c: &mut Criterion) {
    let mut group = c.benchmark_group("register");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let backends = [("memory", memory_engine()), ("sqlite", sqlite_engine(&dir))];

    for (name, engine) in backends {
        let next_user = AtomicI64::new(0);
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.to_async(&runtime).iter(|| {
                let user_id = next_user.fetch_add(1, Ordering::Relaxed);
                let engine = engine.clone();
                async move { black_box(engine.register("bench", user_id).await.unwrap()) }
            });
        });
    }

    group.finish();
}

fn bench_admit_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("admit");
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for batch in [1usize, 10, 100] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("memory", batch), &batch, |b, &batch| {
            // Only the admit call is timed; refilling the queue is not
            b.to_async(&runtime).iter_custom(|iters| async move {
                let mut elapsed = Duration::ZERO;
                for _ in 0..iters {
                    let engine = memory_engine();
                    for user in 0..batch as i64 {
                        engine.register("bench", user).await.unwrap();
                    }

                    let start = Instant::now();
                    black_box(engine.admit("bench", batch).await.unwrap());
                    elapsed += start.elapsed();
                }
                elapsed
            });
        });
    }

    group.finish();
}

fn bench_wait_rank(c: &mut Criterion) {
    let mut group = c.benchmark_group("wait_rank");
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();

    for (name, engine) in [("memory", memory_engine()), ("sqlite", sqlite_engine(&dir))] {
        runtime.block_on(async {
            for user in 0..1_000 {
                engine.register("bench", user).await.unwrap();
            }
        });

        let engine = &engine;
        group.bench_function(BenchmarkId::from_parameter(name), |b| {
            b.to_async(&runtime)
                .iter(|| async move { black_box(engine.wait_rank("bench", 999).await.unwrap()) });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_register, bench_admit_batch, bench_wait_rank);
criterion_main!(benches);
