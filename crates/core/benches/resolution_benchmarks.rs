//! Resolution benchmarks
//!
//! Measures the cached singleton path, transient auto-wiring and long
//! dependency chains.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::convert::Infallible;
use std::sync::Arc;

use keystone_core::container::{Container, Lifecycle, Resolution, Shape};

struct Config {
    _port: u16,
}

struct Repository {
    _config: Arc<Config>,
}

struct Service {
    _repository: Arc<Repository>,
    _config: Arc<Config>,
}

fn populated_container() -> Container {
    let container = Container::new();
    container
        .register("Config", Lifecycle::Singleton, || {
            Ok::<_, Infallible>(Config { _port: 8080 })
        })
        .unwrap();
    container
        .register_shape(
            "Repository",
            Lifecycle::Singleton,
            Shape::new(|wiring| {
                Ok(Repository {
                    _config: wiring.get("config")?,
                })
            })
            .inject("config", "Config"),
        )
        .unwrap();
    container
        .register_shape(
            "Service",
            Lifecycle::Transient,
            Shape::new(|wiring| {
                Ok(Service {
                    _repository: wiring.get("repository")?,
                    _config: wiring.get("config")?,
                })
            })
            .inject("repository", "Repository")
            .inject("config", "Config"),
        )
        .unwrap();
    container
}

fn benchmark_singleton_hit(c: &mut Criterion) {
    let container = populated_container();
    container.resolve("Config").unwrap();

    c.bench_function("singleton_hit", |b| {
        b.iter(|| black_box(container.resolve(black_box("Config")).unwrap()))
    });
}

fn benchmark_transient_autowire(c: &mut Criterion) {
    let container = populated_container();

    c.bench_function("transient_autowire", |b| {
        b.iter(|| black_box(container.resolve(black_box("Service")).unwrap()))
    });
}

fn benchmark_deep_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("deep_chain");

    for depth in [4usize, 16, 48].iter() {
        group.bench_with_input(BenchmarkId::new("transient", depth), depth, |b, &depth| {
            let container = Container::new();
            container
                .register("Link0", Lifecycle::Transient, || Ok::<_, Infallible>(0usize))
                .unwrap();
            for i in 1..depth {
                let previous = format!("Link{}", i - 1);
                container
                    .register_with(
                        format!("Link{}", i),
                        Lifecycle::Transient,
                        move |cx: &Resolution<'_>| {
                            cx.resolve_typed::<usize>(&previous).map(|value| *value + 1)
                        },
                    )
                    .unwrap();
            }
            let top = format!("Link{}", depth - 1);

            b.iter(|| black_box(container.resolve(&top).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_singleton_hit,
    benchmark_transient_autowire,
    benchmark_deep_chain
);

criterion_main!(benches);
