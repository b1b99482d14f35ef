//! # Propagation Benchmarks
//!
//! Performance benchmarks for formula evaluation and dispatch.
//!
//! Run with: `cargo bench -p tributary-core`

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;
use std::hint::black_box;
use tributary_core::{Effects, Engine, Value};

fn as_i64(value: &Value) -> i64 {
    value.as_i64().unwrap_or(0)
}

/// An extractor over `n` followed by a chain of `size` transformers.
fn create_chain(size: usize) -> Engine {
    let engine = Engine::new(json!({"n": 0}));
    engine.define_extractor("f0", ["n"]).expect("extractor");
    for i in 1..=size {
        engine
            .define_transformer(format!("f{i}"), [format!("f{}", i - 1)], |args| {
                json!(as_i64(&args[0]) + 1)
            })
            .expect("transformer");
    }
    engine.read(&format!("f{size}")).expect("read");
    engine
}

/// One extractor feeding `size` independent transformers.
fn create_fan_out(size: usize) -> Engine {
    let engine = Engine::new(json!({"n": 0}));
    engine.define_extractor("hub", ["n"]).expect("extractor");
    for i in 0..size {
        let id = format!("spoke{i}");
        engine
            .define_transformer(id.clone(), ["hub"], |args| json!(as_i64(&args[0]) * 2))
            .expect("transformer");
        engine.read(&id).expect("read");
    }
    engine
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_chain_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_propagation");

    for size in [10, 100, 1000].iter() {
        let engine = create_chain(*size);
        let mut n = 0;
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                n += 1;
                engine.reset_root_state(json!({"n": n})).expect("reset");
            });
        });
    }

    group.finish();
}

fn bench_fan_out_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_propagation");

    for size in [10, 100, 1000].iter() {
        let engine = create_fan_out(*size);
        let mut n = 0;
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                n += 1;
                engine.reset_root_state(json!({"n": n})).expect("reset");
            });
        });
    }

    group.finish();
}

fn bench_pruned_reset(c: &mut Criterion) {
    let engine = create_chain(1000);
    c.bench_function("pruned_reset", |b| {
        b.iter(|| {
            engine
                .reset_root_state(black_box(json!({"n": 0, "noise": 1})))
                .expect("reset");
            engine
                .reset_root_state(black_box(json!({"n": 0})))
                .expect("reset");
        });
    });
}

fn bench_cached_read(c: &mut Criterion) {
    let engine = create_chain(100);
    c.bench_function("cached_read", |b| {
        b.iter(|| black_box(engine.read("f100").expect("read")));
    });
}

fn bench_dispatch_sync(c: &mut Criterion) {
    let engine = Engine::new(json!({"count": 0}));
    engine.define_extractor("count", ["count"]).expect("extractor");
    engine.define_reducer("increment", vec![], |snapshots, _| {
        let count = as_i64(&snapshots.state()["count"]);
        Ok(Effects::state(json!({"count": count + 1})))
    });

    c.bench_function("dispatch_sync", |b| {
        b.iter(|| engine.dispatch_sync("increment").expect("dispatch"));
    });
}

criterion_group!(
    benches,
    bench_chain_propagation,
    bench_fan_out_propagation,
    bench_pruned_reset,
    bench_cached_read,
    bench_dispatch_sync,
);
criterion_main!(benches);
