//! Benchmarks for handle reference operations

use comet::prelude::*;
use comet::FnFactory;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

trait Position: Object {
    fn x(&self) -> f32;
}

trait Velocity: Object {
    fn dx(&self) -> f32;
}

trait Missing: Object {}

struct Body {
    refs: RefCount,
    x: f32,
    dx: f32,
}

impl Class for Body {
    fn refs(&self) -> &RefCount {
        &self.refs
    }

    fn capabilities<'a>(&'a self, query: &mut CapabilityQuery<'a>) {
        query.provide::<dyn Position>(self).provide::<dyn Velocity>(self);
    }
}

impl Position for Body {
    fn x(&self) -> f32 {
        self.x
    }
}

impl Velocity for Body {
    fn dx(&self) -> f32 {
        self.dx
    }
}

const CLSID_BODY: ClassId = ClassId::new("body");

fn body() -> Body {
    Body {
        refs: RefCount::new(),
        x: 1.0,
        dx: 0.5,
    }
}

fn bench_clone_drop(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_clone_drop");

    for count in [1, 10, 100] {
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let handle = TypedHandle::<dyn Position>::new(body());
            b.iter(|| {
                let clones: Vec<_> = (0..count).map(|_| black_box(&handle).clone()).collect();
                clones
            });
        });
    }

    group.finish();
}

fn bench_narrow(c: &mut Criterion) {
    let mut group = c.benchmark_group("handle_narrow");
    let position = TypedHandle::<dyn Position>::new(body());

    group.bench_function("supported", |b| {
        b.iter(|| {
            let velocity = TypedHandle::<dyn Velocity>::narrow(black_box(&position));
            black_box(velocity.dx())
        });
    });

    group.bench_function("unsupported", |b| {
        b.iter(|| TypedHandle::<dyn Missing>::narrow(black_box(&position)).is_null());
    });

    group.bench_function("via_untyped", |b| {
        b.iter(|| {
            let object = black_box(&position).to_untyped();
            object.cast::<dyn Velocity>().is_not_null()
        });
    });

    group.finish();
}

fn bench_create(c: &mut Criterion) {
    let factory = FnFactory::new("bodies", |class| {
        (*class == CLSID_BODY).then(|| Instance::new(body()))
    });

    c.bench_function("handle_create_from_class", |b| {
        b.iter(|| {
            let position = TypedHandle::<dyn Position>::from_class_in(&factory, black_box(&CLSID_BODY));
            black_box(position.x())
        });
    });
}

criterion_group!(benches, bench_clone_drop, bench_narrow, bench_create);
criterion_main!(benches);
