use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use futures::executor::block_on;
use serde_json::{json, Value};
use std::hint::black_box;
use std::sync::Arc;

use corral::{Module, Mutation, Store, StoreConfig};

fn counter_module() -> Module {
    Module::new()
        .state(json!({ "count": 0, "name": "bench" }))
        .mutation("increment", |state, n| {
            let current = state["count"].as_i64().unwrap_or(0);
            state["count"] = json!(current + n.as_i64().unwrap_or(1));
        })
        .getter("double", |state, _, _| {
            json!(state["count"].as_i64().unwrap_or(0) * 2)
        })
        .action("incrementTwice", |ctx, n| {
            ctx.commit("increment", n.clone())?;
            ctx.commit("increment", n)?;
            Ok(Value::Null)
        })
}

fn store_creation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_creation");

    for module_count in [1, 10, 50].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(module_count),
            module_count,
            |b, &count| {
                b.iter(|| {
                    let root = (0..count).fold(counter_module(), |root, i| {
                        root.module(format!("m{i}"), counter_module())
                    });
                    black_box(Store::new(root).ok())
                });
            },
        );
    }
    group.finish();
}

fn commit_benchmark(c: &mut Criterion) {
    let store = Store::new(counter_module()).expect("valid module");

    c.bench_function("commit", |b| {
        b.iter(|| {
            let _ = store.commit("increment", black_box(json!(1)));
        });
    });
}

fn commit_non_strict_benchmark(c: &mut Criterion) {
    let store = Store::with_config(counter_module(), StoreConfig::default().strict(false))
        .expect("valid module");

    c.bench_function("commit_non_strict", |b| {
        b.iter(|| {
            let _ = store.commit("increment", black_box(json!(1)));
        });
    });
}

fn getter_read_benchmark(c: &mut Criterion) {
    let store = Store::new(counter_module()).expect("valid module");
    let getters = store.getters();

    c.bench_function("getter_read_memoized", |b| {
        b.iter(|| {
            black_box(getters.get("double"));
        });
    });

    c.bench_function("getter_read_after_commit", |b| {
        b.iter(|| {
            let _ = store.commit("increment", json!(1));
            black_box(getters.get("double"));
        });
    });
}

fn dispatch_benchmark(c: &mut Criterion) {
    let store = Store::new(counter_module()).expect("valid module");

    c.bench_function("dispatch", |b| {
        b.iter(|| {
            if let Some(future) = store.dispatch("incrementTwice", black_box(json!(1))) {
                let _ = block_on(future);
            }
        });
    });
}

fn subscriber_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("commit_with_subscribers");

    for subscriber_count in [1, 10, 100].iter() {
        let store = Store::new(counter_module()).expect("valid module");

        for _ in 0..*subscriber_count {
            store.subscribe(Arc::new(|_: &Mutation, _: &Value| {
                // Empty subscriber
            }));
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                b.iter(|| {
                    let _ = store.commit("increment", black_box(json!(1)));
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    store_creation_benchmark,
    commit_benchmark,
    commit_non_strict_benchmark,
    getter_read_benchmark,
    dispatch_benchmark,
    subscriber_benchmark,
);
criterion_main!(benches);
