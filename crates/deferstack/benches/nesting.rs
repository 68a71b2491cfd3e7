//! Benchmarks for synchronous nesting and overflow-heavy chains.

use std::hint::black_box;
use std::rc::Rc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use deferstack::{DeferConfig, DeferStack};

fn chain(stack: &Rc<DeferStack>, remaining: u32) -> deferstack::Result<()> {
    let s = Rc::clone(stack);
    stack.schedule(move || {
        if remaining > 0 {
            chain(&s, remaining - 1)?;
        }
        Ok(())
    })
}

fn bench_shallow(c: &mut Criterion) {
    let stack = Rc::new(DeferStack::new());
    c.bench_function("schedule_idle_noop", |b| {
        b.iter(|| stack.schedule(|| Ok(())).unwrap());
    });
    c.bench_function("schedule_nested_16", |b| {
        b.iter(|| chain(&stack, black_box(16)).unwrap());
    });
}

fn bench_overflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_10k");
    for capacity in [16usize, 64, 256] {
        let stack = Rc::new(DeferStack::with_config(DeferConfig::with_capacity(capacity)).unwrap());
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, _| {
            b.iter(|| chain(&stack, black_box(10_000)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_shallow, bench_overflow);
criterion_main!(benches);
