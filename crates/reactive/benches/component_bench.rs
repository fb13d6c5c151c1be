//! Benchmarks for tether-reactive.
//!
//! Measures the cost of parameter-change churn and of delivering pushes to
//! mounted components.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::rc::Rc;
use tether_core::Value;
use tether_reactive::memory::MemoryService;
use tether_reactive::{QueryComponent, QueryOptions, ServiceRef};

const ITEM: &str = "query item($id: ID!) { item(id: $id) { name } }";

fn echo_service() -> Rc<MemoryService> {
    MemoryService::new(|request| Ok(request.variables.get("id").cloned().unwrap_or(Value::Null)))
}

fn component(service: &Rc<MemoryService>, id: i64) -> QueryComponent {
    let svc: ServiceRef = service.clone();
    let component = QueryComponent::builder()
        .service(svc)
        .options(QueryOptions::new(ITEM).variable("id", id))
        .children(|result| {
            black_box(result.loading);
        })
        .build()
        .unwrap();
    component.mount().unwrap();
    component
}

fn bench_params_changed(c: &mut Criterion) {
    let mut group = c.benchmark_group("params_changed");

    group.bench_function("unchanged", |b| {
        let service = echo_service();
        let svc: ServiceRef = service.clone();
        let component = component(&service, 1);
        let options = QueryOptions::new(ITEM).variable("id", 1);
        b.iter(|| {
            component
                .on_params_changed(black_box(options.clone()), svc.clone())
                .unwrap()
        })
    });

    group.bench_function("replace_and_settle", |b| {
        let service = echo_service();
        let svc: ServiceRef = service.clone();
        let component = component(&service, 0);
        let mut id = 0i64;
        b.iter(|| {
            // Alternate between a few ids so both cache hits and misses occur.
            id = (id + 1) % 8;
            component
                .on_params_changed(QueryOptions::new(ITEM).variable("id", id), svc.clone())
                .unwrap();
            service.flush()
        })
    });

    group.finish();
}

fn bench_push_fan_in(c: &mut Criterion) {
    let mut group = c.benchmark_group("push");

    for size in [1, 10, 100] {
        let service = echo_service();
        let components: Vec<_> = (0..size).map(|i| component(&service, i)).collect();
        service.flush();
        let streams = service.live_streams();

        group.bench_with_input(BenchmarkId::new("push_result", size), &streams, |b, streams| {
            let mut n = 0i64;
            b.iter(|| {
                n += 1;
                for stream in streams {
                    stream.push_result(Value::from(n));
                }
            })
        });
        drop(components);
    }

    group.finish();
}

criterion_group!(benches, bench_params_changed, bench_push_fan_in);
criterion_main!(benches);
