use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use keywise::Store;

fn counter_store() -> Store {
    Store::builder()
        .field("count", 0i64)
        .action("inc", |cx, _args| {
            let n: i64 = cx.get("count")?;
            cx.set("count", n + 1)?;
            Ok(None)
        })
        .build()
}

fn store_build_benchmark(c: &mut Criterion) {
    c.bench_function("store_build", |b| {
        b.iter(|| black_box(counter_store()));
    });
}

fn tracked_read_benchmark(c: &mut Criterion) {
    let store = counter_store();
    let sub = store.subscribe(|| {});
    let view = sub.view();

    c.bench_function("tracked_read", |b| {
        b.iter(|| {
            black_box(view.get::<i64>("count").unwrap());
        });
    });
}

fn raw_read_benchmark(c: &mut Criterion) {
    let store = counter_store();

    c.bench_function("raw_read", |b| {
        b.iter(|| {
            black_box(store.get_raw::<i64>("count").unwrap());
        });
    });
}

fn action_dispatch_benchmark(c: &mut Criterion) {
    let store = counter_store();

    c.bench_function("action_dispatch", |b| {
        b.iter(|| {
            store.call("inc", &[]).unwrap();
        });
    });
}

fn notify_fanout_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("notify_fanout");

    for subscriber_count in [1, 10, 100].iter() {
        let store = counter_store();

        let subs: Vec<_> = (0..*subscriber_count)
            .map(|_| {
                let sub = store.subscribe(|| {});
                let _: i64 = sub.view().get("count").unwrap();
                sub
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                b.iter(|| {
                    store.call("inc", &[]).unwrap();
                    // Renders re-read so the dependency sets stay seeded.
                    for sub in &subs {
                        let _: i64 = sub.view().get("count").unwrap();
                    }
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    store_build_benchmark,
    tracked_read_benchmark,
    raw_read_benchmark,
    action_dispatch_benchmark,
    notify_fanout_benchmark,
);
criterion_main!(benches);
