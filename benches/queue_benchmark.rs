use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use procurement_bridge::PriorityQueue;
use std::sync::Arc;

fn put_then_get(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("priority_queue_put_get");

    for size in [100usize, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                rt.block_on(async {
                    let queue = PriorityQueue::new(None);
                    for i in 0..size {
                        queue.put((size - i) as i64, i).await;
                    }
                    for _ in 0..size {
                        black_box(queue.get().await);
                    }
                });
            });
        });
    }
    group.finish();
}

fn concurrent_producers(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("priority_queue_concurrent_put", |b| {
        b.iter(|| {
            rt.block_on(async {
                let queue = Arc::new(PriorityQueue::new(Some(256)));
                let mut producers = Vec::new();
                for p in 0..4 {
                    let queue = queue.clone();
                    producers.push(tokio::spawn(async move {
                        for i in 0..100 {
                            queue.put(p, i).await;
                        }
                    }));
                }
                for producer in producers {
                    producer.await.unwrap();
                }
                for _ in 0..400 {
                    black_box(queue.get().await);
                }
            });
        });
    });
}

criterion_group!(benches, put_then_get, concurrent_producers);
criterion_main!(benches);
