use criterion::{black_box, criterion_group, criterion_main, Criterion};

use weft_core::{batch, observable, watch, Signal, Value};

fn signal_write_with_watcher(c: &mut Criterion) {
    let signal = Signal::new(0i64);
    let signal_read = signal.clone();
    let _watcher = watch(move || signal_read.get(), |_| {});

    let mut next = 1i64;
    c.bench_function("signal_write_with_watcher", |b| {
        b.iter(|| {
            signal.set(black_box(next));
            next += 1;
        })
    });
}

fn wrapper_property_write(c: &mut Criterion) {
    let state = observable(Value::from(serde_json::json!({"count": 0})));
    let object = state.as_object().expect("object").clone();
    let reader = object.clone();
    let _watcher = watch(move || reader.get("count"), |_| {});

    let mut next = 1i64;
    c.bench_function("wrapper_property_write", |b| {
        b.iter(|| {
            object.set("count", black_box(next));
            next += 1;
        })
    });
}

fn batched_bulk_update(c: &mut Criterion) {
    let state = observable(Value::from(serde_json::json!({"a": 0, "b": 0, "c": 0})));
    let object = state.as_object().expect("object").clone();
    let reader = state.clone();
    let _watcher = watch(move || weft_core::version(&reader), |_| {});

    let mut next = 1i64;
    c.bench_function("batched_bulk_update", |b| {
        b.iter(|| {
            batch(|| {
                object.set("a", black_box(next));
                object.set("b", black_box(next + 1));
                object.set("c", black_box(next + 2));
            });
            next += 3;
        })
    });
}

criterion_group!(
    benches,
    signal_write_with_watcher,
    wrapper_property_write,
    batched_bulk_update
);
criterion_main!(benches);
